// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver-side dispatch arms: reads, writes, subscriptions, group and tag
//! configuration.
//!
//! Every handler replies on the control path; persistence failures degrade
//! to warnings because the in-memory state is authoritative for the running
//! process.

use crate::adapter::Adapter;
use crate::driver::{DriverCore, Subscriber};
use crate::plugin::{WriteOutcome, WriteRequest};
use axon_core::{
    log_category, Clock, Envelope, ErrorCode, GroupInfo, GroupTagValues, JsonKind, Message, Tag,
    TagQuery, TagValue, Value,
};
use axon_metrics::names;
use axon_storage::GroupRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

static NEXT_WRITE_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_WRITE_TOKEN.fetch_add(1, Ordering::Relaxed)
}

impl<C: Clock> Adapter<C> {
    fn driver_core(&self) -> Option<&DriverCore> {
        self.shared.driver.as_ref()
    }

    fn persist_warn(&self, what: &str, result: Result<(), axon_storage::StoreError>) {
        if let Err(e) = result {
            warn!(node = %log_category(&self.name()), error = %e, "{what} persist failed");
        }
    }

    // -- reads ---------------------------------------------------------------

    pub(crate) fn driver_read(&self, env: &Envelope) {
        let Some(driver) = self.driver_core() else {
            self.send(env.reply_error(ErrorCode::Internal));
            return;
        };
        if self.running_state() != axon_core::RunningState::Running {
            self.send(env.reply_error(ErrorCode::NodeNotRunning));
            return;
        }
        let now_ms = self.shared.clock.epoch_ms();

        match &env.message {
            Message::ReadGroup {
                driver: driver_name,
                group,
                name_filter,
                desc_filter,
                sync,
                tags,
            } => {
                let query = TagQuery {
                    name_contains: name_filter.clone(),
                    desc_contains: desc_filter.clone(),
                    names: tags.clone(),
                    readable_only: true,
                };
                let reply = {
                    let mut plugin = self.shared.plugin.lock();
                    let Some(plugin) = plugin.as_driver() else {
                        self.send(env.reply_error(ErrorCode::Internal));
                        return;
                    };
                    match driver.read_group(group, &query, *sync, now_ms, plugin) {
                        Ok((samples, cache_hits)) => {
                            self.bump_metric(names::TAG_READS_TOTAL, samples.len() as u64);
                            if cache_hits > 0 {
                                self.bump_metric(names::CACHE_HITS_TOTAL, cache_hits);
                            }
                            env.reply(Message::ReadGroupResp {
                                driver: driver_name.clone(),
                                group: group.clone(),
                                tags: samples,
                            })
                        }
                        Err(code) => env.reply_error(code),
                    }
                };
                self.send(reply);
            }
            Message::ReadGroupPaged {
                driver: driver_name,
                group,
                name_filter,
                desc_filter,
                current_page,
                page_size,
                is_error,
            } => {
                let query = TagQuery {
                    name_contains: name_filter.clone(),
                    desc_contains: desc_filter.clone(),
                    names: Vec::new(),
                    readable_only: true,
                };
                let reply = {
                    let mut plugin = self.shared.plugin.lock();
                    let Some(plugin) = plugin.as_driver() else {
                        self.send(env.reply_error(ErrorCode::Internal));
                        return;
                    };
                    match driver.read_group(group, &query, false, now_ms, plugin) {
                        Ok((mut samples, _)) => {
                            if *is_error {
                                samples.retain(|s| s.value.is_error());
                            }
                            // Total counts the whole filtered set, not the page
                            let total_count = samples.len() as u32;
                            let page: Vec<_> = samples
                                .into_iter()
                                .skip((current_page.saturating_sub(1) as usize)
                                    * (*page_size as usize))
                                .take(*page_size as usize)
                                .collect();
                            env.reply(Message::ReadGroupPagedResp {
                                driver: driver_name.clone(),
                                group: group.clone(),
                                tags: page,
                                total_count,
                            })
                        }
                        Err(code) => env.reply_error(code),
                    }
                };
                self.send(reply);
            }
            _ => self.send(env.reply_error(ErrorCode::BodyInvalid)),
        }
    }

    pub(crate) fn driver_test_read(&self, env: &Envelope) {
        let Message::TestReadTag { tag, .. } = &env.message else {
            self.send(env.reply_error(ErrorCode::BodyInvalid));
            return;
        };
        if self.running_state() != axon_core::RunningState::Running {
            self.send(env.reply_error(ErrorCode::NodeNotRunning));
            return;
        }
        let reply = {
            let mut plugin = self.shared.plugin.lock();
            let Some(plugin) = plugin.as_driver() else {
                self.send(env.reply_error(ErrorCode::Internal));
                return;
            };
            match plugin.test_read(tag) {
                Ok(value) => {
                    let value = value.sanitized();
                    env.reply(Message::TestReadTagResp {
                        data_type: tag.data_type,
                        json_kind: JsonKind::of(&value),
                        value,
                        error: ErrorCode::Success,
                    })
                }
                Err(code) => env.reply(Message::TestReadTagResp {
                    data_type: tag.data_type,
                    json_kind: JsonKind::Int,
                    value: Value::Error(code),
                    error: code,
                }),
            }
        };
        self.send(reply);
    }

    // -- writes --------------------------------------------------------------

    /// Validate, enqueue, and let the plugin confirm asynchronously. The
    /// request envelope waits in the responder with its context untouched so
    /// the originating app can close its latency span.
    pub(crate) fn driver_write(&self, env: &Envelope) {
        let Some(driver) = self.driver_core() else {
            self.send(env.reply_error(ErrorCode::Internal));
            return;
        };
        if self.running_state() != axon_core::RunningState::Running {
            self.send(env.reply_error(ErrorCode::NodeNotRunning));
            return;
        }

        let batches: Vec<GroupTagValues> = match &env.message {
            Message::WriteTag { group, tag, value, .. } => vec![GroupTagValues {
                group: group.clone(),
                tags: vec![TagValue {
                    tag: tag.clone(),
                    value: value.clone(),
                }],
            }],
            Message::WriteTags { group, tags, .. } => vec![GroupTagValues {
                group: group.clone(),
                tags: tags.clone(),
            }],
            Message::WriteGtags { groups, .. } => groups.clone(),
            _ => {
                self.send(env.reply_error(ErrorCode::BodyInvalid));
                return;
            }
        };

        // Validate every batch before dispatching any
        for batch in &batches {
            if let Err(code) = driver.validate_write(&batch.group, &batch.tags) {
                self.send(env.reply_error(code));
                return;
            }
        }

        let tokens: Vec<u64> = batches.iter().map(|_| next_token()).collect();
        self.shared.responder.track_all(&tokens, env.clone());

        let write_count: u64 = batches.iter().map(|b| b.tags.len() as u64).sum();
        self.bump_metric(names::TAG_WRITES_TOTAL, write_count);

        let mut plugin = self.shared.plugin.lock();
        let Some(plugin) = plugin.as_driver() else {
            return;
        };
        for (batch, token) in batches.into_iter().zip(tokens) {
            let request = WriteRequest {
                token,
                group: batch.group,
                tags: batch.tags,
            };
            match plugin.write(request, &self.shared.responder) {
                WriteOutcome::Done(code) => self.shared.responder.respond(token, code),
                WriteOutcome::Pending => {}
            }
        }
    }

    // -- subscriptions -------------------------------------------------------

    pub(crate) fn driver_subscribe(&self, env: &Envelope) {
        let Some(driver) = self.driver_core() else {
            self.send(env.reply_error(ErrorCode::Internal));
            return;
        };
        let now_us = self.shared.clock.epoch_us();
        let name = self.name();
        let code = match &env.message {
            Message::SubscribeGroup {
                app,
                group,
                port,
                params,
                static_tags,
                ..
            } => {
                let result = driver.subscribe(
                    group,
                    Subscriber {
                        app: app.clone(),
                        port: *port,
                        params: params.clone(),
                        static_tags: static_tags.clone(),
                    },
                    now_us,
                );
                if result.is_ok() {
                    let mut sub = axon_core::Subscription::new(app.clone(), name, group.clone());
                    sub.params = params.clone();
                    sub.static_tags = static_tags.clone();
                    self.persist_warn("subscription", self.shared.store.add_subscription(&sub));
                }
                ErrorCode::from_result(result)
            }
            Message::UnsubscribeGroup { app, group, .. } => {
                let result = driver.unsubscribe(group, app, now_us);
                if result.is_ok() {
                    self.persist_warn(
                        "subscription",
                        self.shared.store.del_subscription(app, &name, group),
                    );
                }
                ErrorCode::from_result(result)
            }
            Message::UpdateSubscribeGroup {
                app,
                group,
                params,
                static_tags,
                ..
            } => {
                let result = driver.update_subscribe(
                    group,
                    app,
                    params.clone(),
                    static_tags.clone(),
                    now_us,
                );
                if result.is_ok() {
                    let mut sub = axon_core::Subscription::new(app.clone(), name, group.clone());
                    sub.params = params.clone();
                    sub.static_tags = static_tags.clone();
                    self.persist_warn(
                        "subscription",
                        self.shared.store.update_subscription(&sub),
                    );
                }
                ErrorCode::from_result(result)
            }
            _ => ErrorCode::BodyInvalid,
        };
        self.send(env.reply_error(code));
    }

    // -- group configuration -------------------------------------------------

    pub(crate) fn driver_group_op(&self, env: &Envelope) {
        let Some(driver) = self.driver_core() else {
            self.send(env.reply_error(ErrorCode::Internal));
            return;
        };
        let name = self.name();
        let now_ms = self.shared.clock.epoch_ms();
        let now_us = self.shared.clock.epoch_us();

        match &env.message {
            Message::AddGroup {
                group,
                interval_ms,
                context,
                ..
            } => {
                let code = match driver.add_group(group, *interval_ms, context.clone(), now_ms) {
                    Ok(_) => {
                        self.persist_warn(
                            "group",
                            self.shared.store.add_group(&GroupRecord {
                                driver: name.clone(),
                                name: group.clone(),
                                interval_ms: *interval_ms,
                                context: context.clone(),
                            }),
                        );
                        ErrorCode::Success
                    }
                    Err(code) => code,
                };
                self.send(env.reply_error(code));
            }
            Message::DelGroup { group, .. } => {
                let code = match driver.del_group(group) {
                    Ok(()) => {
                        self.persist_warn("group", self.shared.store.del_group(&name, group));
                        ErrorCode::Success
                    }
                    Err(code) => code,
                };
                self.send(env.reply_error(code));
            }
            Message::UpdateGroup {
                group,
                new_name,
                interval_ms,
                ..
            }
            | Message::UpdateDriverGroup {
                group,
                new_name,
                interval_ms,
                ..
            } => {
                let code =
                    match driver.update_group(group, new_name.as_deref(), *interval_ms, now_us) {
                        Ok(()) => {
                            let snapshot = driver
                                .group(new_name.as_deref().unwrap_or(group))
                                .map(|g| g.snapshot());
                            if let Some(snapshot) = snapshot {
                                self.persist_warn(
                                    "group",
                                    self.shared.store.update_group(
                                        &name,
                                        group,
                                        &GroupRecord {
                                            driver: name.clone(),
                                            name: snapshot.name,
                                            interval_ms: snapshot.interval_ms,
                                            context: snapshot.context,
                                        },
                                    ),
                                );
                            }
                            ErrorCode::Success
                        }
                        Err(code) => code,
                    };
                self.send(env.reply_error(code));
            }
            Message::GetGroup { .. } => {
                let groups = group_infos(driver);
                self.send(env.reply(Message::GetGroupResp {
                    driver: name,
                    groups,
                }));
            }
            Message::GetDriverGroup { .. } => {
                let groups = group_infos(driver);
                self.send(env.reply(Message::GetDriverGroupResp {
                    driver: name,
                    groups,
                }));
            }
            _ => self.send(env.reply_error(ErrorCode::BodyInvalid)),
        }
    }

    // -- tag configuration ---------------------------------------------------

    pub(crate) fn driver_tag_op(&self, env: &Envelope) {
        let Some(driver) = self.driver_core() else {
            self.send(env.reply_error(ErrorCode::Internal));
            return;
        };
        let name = self.name();
        let now_ms = self.shared.clock.epoch_ms();
        let now_us = self.shared.clock.epoch_us();

        match &env.message {
            Message::AddTag { group, tags, .. } => {
                let reply = match self.add_tags_to_group(driver, &name, group, tags, now_us) {
                    Ok(added) => env.reply(Message::AddTagResp {
                        added,
                        error: ErrorCode::Success,
                    }),
                    Err(code) => env.reply(Message::AddTagResp {
                        added: 0,
                        error: code,
                    }),
                };
                self.send(reply);
            }
            Message::UpdateTag { group, tags, .. } => {
                let mut updated = 0u16;
                let mut error = ErrorCode::Success;
                if let Some(g) = driver.group(group) {
                    for tag in tags {
                        let result = self
                            .validate_with_plugin(tag)
                            .and_then(|()| g.update_tag(tag.clone(), now_us));
                        match result {
                            Ok(()) => {
                                driver.cache().remove_tag(group, &tag.name);
                                self.persist_warn(
                                    "tag",
                                    self.shared.store.update_tag(&name, group, tag),
                                );
                                updated += 1;
                            }
                            Err(code) => {
                                error = code;
                                break;
                            }
                        }
                    }
                } else {
                    error = ErrorCode::GroupNotExist;
                }
                self.send(env.reply(Message::UpdateTagResp { updated, error }));
            }
            Message::DelTag { group, tags, .. } => {
                let code = match driver.group(group) {
                    Some(g) => {
                        let mut code = ErrorCode::Success;
                        for tag in tags {
                            match g.del_tag(tag, now_us) {
                                Ok(()) => {
                                    driver.cache().remove_tag(group, tag);
                                    self.persist_warn(
                                        "tag",
                                        self.shared.store.del_tag(&name, group, tag),
                                    );
                                }
                                Err(e) => {
                                    code = e;
                                    break;
                                }
                            }
                        }
                        code
                    }
                    None => ErrorCode::GroupNotExist,
                };
                self.send(env.reply_error(code));
            }
            Message::AddGtag { groups, .. } => {
                let reply = match self.add_gtags(driver, &name, groups, now_ms, now_us) {
                    Ok(added) => env.reply(Message::AddGtagResp {
                        added,
                        error: ErrorCode::Success,
                    }),
                    Err(code) => env.reply(Message::AddGtagResp {
                        added: 0,
                        error: code,
                    }),
                };
                self.send(reply);
            }
            Message::GetTag { group, filter, .. } => {
                let reply = match driver.group(group) {
                    Some(g) => {
                        let tags = g.query(&TagQuery {
                            name_contains: filter.clone(),
                            ..Default::default()
                        });
                        env.reply(Message::GetTagResp { tags })
                    }
                    None => env.reply_error(ErrorCode::GroupNotExist),
                };
                self.send(reply);
            }
            _ => self.send(env.reply_error(ErrorCode::BodyInvalid)),
        }
    }

    fn validate_with_plugin(&self, tag: &Tag) -> Result<(), ErrorCode> {
        let mut plugin = self.shared.plugin.lock();
        let Some(plugin) = plugin.as_driver() else {
            return Err(ErrorCode::Internal);
        };
        plugin.validate_tag(tag)
    }

    fn add_tags_to_group(
        &self,
        driver: &DriverCore,
        node: &str,
        group: &str,
        tags: &[Tag],
        now_us: i64,
    ) -> Result<u16, ErrorCode> {
        let g = driver.group(group).ok_or(ErrorCode::GroupNotExist)?;
        for tag in tags {
            self.validate_with_plugin(tag)?;
        }
        g.add_tags(tags.to_vec(), now_us)?;
        self.persist_warn("tags", self.shared.store.add_tags(node, group, tags));
        Ok(tags.len() as u16)
    }

    /// Multi-group add: validate everything, then apply; a failure leaves no
    /// partial group or tag behind.
    fn add_gtags(
        &self,
        driver: &DriverCore,
        node: &str,
        groups: &[axon_core::GtagGroup],
        now_ms: i64,
        now_us: i64,
    ) -> Result<u16, ErrorCode> {
        // Phase 1: validate without touching state
        for entry in groups {
            if entry.interval_ms < axon_core::limits::GROUP_INTERVAL_MIN_MS {
                return Err(ErrorCode::GroupParameterInvalid);
            }
            let existing = driver.group(&entry.group);
            for (i, tag) in entry.tags.iter().enumerate() {
                tag.validate()?;
                self.validate_with_plugin(tag)?;
                if entry.tags[..i].iter().any(|t| t.name == tag.name) {
                    return Err(ErrorCode::TagNameConflict);
                }
                if let Some(g) = &existing {
                    if g.get_tag(&tag.name).is_some() {
                        return Err(ErrorCode::TagNameConflict);
                    }
                }
            }
        }

        // Phase 2: apply; revert created groups if anything still fails
        let mut created: Vec<String> = Vec::new();
        let mut added = 0u16;
        let result: Result<(), ErrorCode> = (|| {
            for entry in groups {
                let g = match driver.group(&entry.group) {
                    Some(g) => g,
                    None => {
                        let g = driver.add_group(&entry.group, entry.interval_ms, None, now_ms)?;
                        created.push(entry.group.clone());
                        g
                    }
                };
                g.add_tags(entry.tags.clone(), now_us)?;
                added += entry.tags.len() as u16;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                for entry in groups {
                    if created.contains(&entry.group) {
                        self.persist_warn(
                            "group",
                            self.shared.store.add_group(&GroupRecord {
                                driver: node.to_string(),
                                name: entry.group.clone(),
                                interval_ms: entry.interval_ms,
                                context: None,
                            }),
                        );
                    }
                    self.persist_warn(
                        "tags",
                        self.shared.store.add_tags(node, &entry.group, &entry.tags),
                    );
                }
                Ok(added)
            }
            Err(code) => {
                // No partial state: drop groups this request created and the
                // tags it managed to add to pre-existing ones
                for entry in groups {
                    if created.contains(&entry.group) {
                        let _ = driver.del_group(&entry.group);
                    } else if let Some(g) = driver.group(&entry.group) {
                        for tag in &entry.tags {
                            let _ = g.del_tag(&tag.name, now_us);
                        }
                    }
                }
                Err(code)
            }
        }
    }

    // -- scan / program file / action ---------------------------------------

    pub(crate) fn driver_misc(&self, env: &Envelope) {
        let reply = {
            let mut plugin = self.shared.plugin.lock();
            let Some(plugin) = plugin.as_driver() else {
                self.send(env.reply_error(ErrorCode::Internal));
                return;
            };
            match &env.message {
                Message::ScanTags { ctx, .. } => match plugin.scan_tags(ctx) {
                    Ok(result) => env.reply(Message::ScanTagsResp {
                        tags: result.tags,
                        error: ErrorCode::Success,
                        data_type: result.data_type,
                        is_array: result.is_array,
                        is_last: result.is_last,
                        ctx: result.ctx,
                    }),
                    Err(code) => env.reply(Message::ScanTagsResp {
                        tags: Vec::new(),
                        error: code,
                        data_type: None,
                        is_array: false,
                        // A failed scan cannot be continued
                        is_last: true,
                        ctx: String::new(),
                    }),
                },
                Message::PrgFileUpload { name, data, .. } => {
                    let code = ErrorCode::from_result(plugin.prg_file(name, data));
                    env.reply_error(code)
                }
                Message::PrgFileProcess { .. } => {
                    let (state, reason) = plugin.prg_file_state();
                    env.reply(Message::PrgFileProcessResp { state, reason })
                }
                Message::DriverAction { action, .. } => match plugin.action(action) {
                    Ok(data) => env.reply(Message::DriverActionResp {
                        error: ErrorCode::Success,
                        data,
                    }),
                    Err(code) => env.reply(Message::DriverActionResp {
                        error: code,
                        data: None,
                    }),
                },
                _ => env.reply_error(ErrorCode::BodyInvalid),
            }
        };
        self.send(reply);
    }
}

fn group_infos(driver: &DriverCore) -> Vec<GroupInfo> {
    driver
        .snapshots()
        .into_iter()
        .map(|s| GroupInfo {
            name: s.name,
            interval_ms: s.interval_ms,
            tag_count: s.tag_count,
            context: s.context,
        })
        .collect()
}
