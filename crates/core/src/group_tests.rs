// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::tag::TagAttr;
use crate::value::DataType;

fn tag(name: &str) -> Tag {
    Tag::new(name, "400001", DataType::Int16)
}

#[test]
fn interval_floor_is_100ms() {
    assert_eq!(
        Group::new("g", 99).err(),
        Some(ErrorCode::GroupParameterInvalid)
    );
    assert!(Group::new("g", 100).is_ok());
}

#[test]
fn group_name_boundary() {
    assert!(Group::new("g".repeat(128), 1000).is_ok());
    assert_eq!(
        Group::new("g".repeat(129), 1000).err(),
        Some(ErrorCode::GroupNameTooLong)
    );
}

#[test]
fn change_timestamp_is_strictly_monotone() {
    let g = Group::new("g", 1000).unwrap();
    let t0 = g.timestamp();

    g.add_tag(tag("a"), 500).unwrap();
    let t1 = g.timestamp();
    assert!(t1 > t0);

    // Same wall-clock microsecond still moves the marker forward
    g.add_tag(tag("b"), 500).unwrap();
    let t2 = g.timestamp();
    assert!(t2 > t1);

    g.del_tag("b", 400).unwrap();
    assert!(g.timestamp() > t2);
}

#[test]
fn noop_mutations_do_not_bump() {
    let g = Group::new("g", 1000).unwrap();
    g.add_tag(tag("a"), 10).unwrap();
    let ts = g.timestamp();

    // Updating with an identical descriptor changes nothing
    g.update_tag(tag("a"), 20).unwrap();
    assert_eq!(g.timestamp(), ts);

    // Same interval changes nothing
    assert!(!g.set_interval(1000, 30).unwrap());
    assert_eq!(g.timestamp(), ts);

    // A real interval change bumps
    assert!(g.set_interval(500, 40).unwrap());
    assert!(g.timestamp() > ts);
}

#[test]
fn add_del_returns_to_prior_tag_set() {
    let g = Group::new("g", 1000).unwrap();
    g.add_tag(tag("keep"), 10).unwrap();
    let before = g.get_all();

    g.add_tag(tag("gone"), 20).unwrap();
    g.del_tag("gone", 30).unwrap();
    assert_eq!(g.get_all(), before);
}

#[test]
fn duplicate_tag_rejected() {
    let g = Group::new("g", 1000).unwrap();
    g.add_tag(tag("a"), 10).unwrap();
    assert_eq!(g.add_tag(tag("a"), 20), Err(ErrorCode::TagNameConflict));
}

#[test]
fn batch_add_is_atomic() {
    let g = Group::new("g", 1000).unwrap();
    g.add_tag(tag("a"), 10).unwrap();
    let ts = g.timestamp();

    // Second entry collides; first must not be inserted
    let err = g.add_tags(vec![tag("b"), tag("a")], 20);
    assert_eq!(err, Err(ErrorCode::TagNameConflict));
    assert_eq!(g.tag_count(), 1);
    assert_eq!(g.timestamp(), ts);

    // Intra-batch duplicates are also rejected wholesale
    let err = g.add_tags(vec![tag("c"), tag("c")], 30);
    assert_eq!(err, Err(ErrorCode::TagNameConflict));
    assert_eq!(g.tag_count(), 1);
}

#[test]
fn update_missing_tag_fails() {
    let g = Group::new("g", 1000).unwrap();
    assert_eq!(g.update_tag(tag("a"), 10), Err(ErrorCode::TagNotExist));
    assert_eq!(g.del_tag("a", 10), Err(ErrorCode::TagNotExist));
}

#[test]
fn readable_filter_is_read_or_subscribe() {
    let g = Group::new("g", 1000).unwrap();
    g.add_tag(tag("r"), 10).unwrap();
    g.add_tag(
        Tag::new("w", "400002", DataType::Int16).with_attribute(TagAttr::WRITE),
        20,
    )
    .unwrap();
    g.add_tag(
        Tag::new("s", "400003", DataType::Int16).with_attribute(TagAttr::SUBSCRIBE),
        30,
    )
    .unwrap();

    let query = TagQuery {
        readable_only: true,
        ..Default::default()
    };
    let names: Vec<String> = g.query(&query).into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["r".to_string(), "s".to_string()]);
}

#[test]
fn query_filters_compose() {
    let g = Group::new("g", 1000).unwrap();
    let mut a = tag("boiler_temp");
    a.description = "north boiler".into();
    let mut b = tag("boiler_pressure");
    b.description = "south boiler".into();
    g.add_tags(vec![a, b], 10).unwrap();

    let query = TagQuery {
        name_contains: Some("boiler".into()),
        desc_contains: Some("north".into()),
        ..Default::default()
    };
    assert_eq!(g.query(&query).len(), 1);

    let query = TagQuery {
        names: vec!["boiler_pressure".into()],
        ..Default::default()
    };
    assert_eq!(g.query(&query)[0].name, "boiler_pressure");
}

#[test]
fn pagination_reports_filtered_total() {
    let g = Group::new("g", 1000).unwrap();
    let tags: Vec<Tag> = (0..25).map(|i| tag(&format!("t{i:02}"))).collect();
    g.add_tags(tags, 10).unwrap();

    let query = TagQuery::default();
    let (page, total) = g.query_paged(&query, 2, 10);
    assert_eq!(total, 25);
    assert_eq!(page.len(), 10);
    assert_eq!(page[0].name, "t10");

    let (page, total) = g.query_paged(&query, 3, 10);
    assert_eq!(total, 25);
    assert_eq!(page.len(), 5);
}

#[test]
fn touch_moves_timestamp() {
    let g = Group::new("g", 1000).unwrap();
    let ts = g.timestamp();
    g.touch(99);
    assert!(g.timestamp() > ts);
}

#[test]
fn context_round_trip() {
    let g = Group::new("g", 1000)
        .unwrap()
        .with_context(Some("ctl|ied1|ld0|LLN0|buffered|rpt|rid|ds".into()));
    assert_eq!(g.snapshot().context.as_deref(), Some("ctl|ied1|ld0|LLN0|buffered|rpt|rid|ds"));
}
