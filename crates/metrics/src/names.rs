// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Well-known metric names and help strings.
//!
//! Name and help are `'static` literals so entries can be registered by many
//! nodes and compared by pointer-free equality.

// -- shared node set --
pub const RECV_MSGS_TOTAL: &str = "recv_msgs_total";
pub const RECV_MSGS_TOTAL_HELP: &str = "Total messages received by the node";
pub const SEND_MSGS_TOTAL: &str = "send_msgs_total";
pub const SEND_MSGS_TOTAL_HELP: &str = "Total messages sent by the node";
pub const RUNNING_STATE: &str = "running_state";
pub const RUNNING_STATE_HELP: &str = "Node running state";
pub const LINK_STATE: &str = "link_state";
pub const LINK_STATE_HELP: &str = "Device link state";

// -- driver set --
pub const TAG_READS_TOTAL: &str = "tag_reads_total";
pub const TAG_READS_TOTAL_HELP: &str = "Total tag reads, including cache hits";
pub const TAG_READ_ERRORS_TOTAL: &str = "tag_read_errors_total";
pub const TAG_READ_ERRORS_TOTAL_HELP: &str = "Total tag reads that produced an error value";
pub const GROUP_TAGS_TOTAL: &str = "group_tags_total";
pub const GROUP_TAGS_TOTAL_HELP: &str = "Tags configured across all groups";
pub const GROUPS_TOTAL: &str = "groups_total";
pub const GROUPS_TOTAL_HELP: &str = "Groups configured on the node";
pub const TAG_WRITES_TOTAL: &str = "tag_writes_total";
pub const TAG_WRITES_TOTAL_HELP: &str = "Total tag writes accepted";
pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
pub const CACHE_HITS_TOTAL_HELP: &str = "Reads served from the tag cache";

// -- app set --
pub const TRANS_DATA_TOTAL: &str = "trans_data_total";
pub const TRANS_DATA_TOTAL_HELP: &str = "Telemetry envelopes consumed";
pub const TRANS_DATA_DROPPED_TOTAL: &str = "trans_data_dropped_total";
pub const TRANS_DATA_DROPPED_TOTAL_HELP: &str = "Telemetry envelopes dropped on mailbox overflow";
pub const TRANS_DATA_RATE_1M: &str = "trans_data_rate_1m";
pub const TRANS_DATA_RATE_1M_HELP: &str = "Telemetry envelopes over the last minute";

// -- system set, refreshed by the registry visitor --
pub const CPU_PERCENT: &str = "cpu_percent";
pub const CPU_PERCENT_HELP: &str = "Process-host CPU usage percentage";
pub const MEM_USED_BYTES: &str = "mem_used_bytes";
pub const MEM_USED_BYTES_HELP: &str = "Used physical memory in bytes";
pub const MEM_TOTAL_BYTES: &str = "mem_total_bytes";
pub const MEM_TOTAL_BYTES_HELP: &str = "Total physical memory in bytes";
pub const DISK_USED_BYTES: &str = "disk_used_bytes";
pub const DISK_USED_BYTES_HELP: &str = "Used bytes on the state filesystem";
pub const DISK_TOTAL_BYTES: &str = "disk_total_bytes";
pub const DISK_TOTAL_BYTES_HELP: &str = "Total bytes on the state filesystem";
pub const UPTIME_SECONDS: &str = "uptime_seconds";
pub const UPTIME_SECONDS_HELP: &str = "Seconds since the broker started";
pub const CORE_DUMPED: &str = "core_dumped";
pub const CORE_DUMPED_HELP: &str = "Whether a core dump is present in the dump directory";
