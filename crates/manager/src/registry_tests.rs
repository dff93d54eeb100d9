// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axon_core::NodeKind;
use axon_runtime::sim::SimDriver;

fn descriptor(name: &str, kind: PluginKind) -> PluginDescriptor {
    PluginDescriptor {
        name: name.into(),
        library: format!("libplugin-{name}"),
        schema: name.into(),
        kind,
        node_kind: NodeKind::Driver,
        version: "2.0.0".into(),
        single_instance: false,
        display: true,
        single_instance_name: None,
        description: String::new(),
    }
}

fn registry_with(name: &str, kind: PluginKind) -> PluginRegistry {
    let registry = PluginRegistry::new();
    registry
        .register(descriptor(name, kind), || {
            PluginInstance::Driver(Box::new(SimDriver::new()))
        })
        .unwrap();
    registry
}

#[test]
fn instantiate_builds_fresh_instances() {
    let registry = registry_with("sim", PluginKind::System);
    let (desc, instance) = registry.instantiate("sim").unwrap();
    assert_eq!(desc.name, "sim");
    assert!(matches!(instance, PluginInstance::Driver(_)));
    assert_eq!(
        registry.instantiate("ghost").err(),
        Some(ErrorCode::PluginNotExist)
    );
}

#[test]
fn static_plugins_cannot_be_removed() {
    let registry = registry_with("core", PluginKind::Static);
    assert_eq!(
        registry.remove("core").err(),
        Some(ErrorCode::PluginNotAllowDelete)
    );

    let registry = registry_with("custom", PluginKind::Custom);
    assert_eq!(registry.remove("custom"), Ok(()));
    assert_eq!(
        registry.remove("custom").err(),
        Some(ErrorCode::PluginNotExist)
    );
}

#[test]
fn library_confirmation_and_schema_lookup() {
    let registry = registry_with("sim", PluginKind::System);
    assert_eq!(
        registry.confirm_library("libplugin-sim").unwrap().name,
        "sim"
    );
    assert_eq!(
        registry.confirm_library("libplugin-ghost").err(),
        Some(ErrorCode::PluginNotExist)
    );
    assert!(registry.schema_exists("sim"));
    assert!(!registry.schema_exists("ghost"));
}

#[test]
fn oversized_names_are_rejected() {
    let registry = PluginRegistry::new();
    let mut bad = descriptor("x", PluginKind::System);
    bad.name = "p".repeat(33);
    assert_eq!(
        registry
            .register(bad, || PluginInstance::Driver(Box::new(SimDriver::new())))
            .err(),
        Some(ErrorCode::PluginNameTooLong)
    );
}
