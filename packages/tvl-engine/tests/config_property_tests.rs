//! Property-based tests for engine configuration
//!
//! Invariants that should hold for all inputs:
//! - Roundtrip: from_yaml_str(to_yaml(x)) == x
//! - Validity: every well-formed action order parses and validates
//! - Rejection: malformed orders never validate

use proptest::prelude::*;
use tvl_engine::config::*;

// ============================================================================
// Unit cases
// ============================================================================

#[test]
fn test_partial_yaml_keeps_defaults() {
    let config = EngineConfig::from_yaml_str("max_structures: 500\naction_order: pu\n").unwrap();
    assert_eq!(config.max_structures, 500);
    assert_eq!(config.focus_limit, 10_000);
    assert_eq!(config.save_locations, SaveLocations::JoinPoints);
    assert_eq!(config.action_order().unwrap(), ActionOrder::parse("pu").unwrap());
}

#[test]
fn test_yaml_enum_spelling() {
    let config = EngineConfig::from_yaml_str(
        "save_locations: back\nworklist_order: post_order\ntransition_relation: true\n",
    )
    .unwrap();
    assert_eq!(config.save_locations, SaveLocations::Back);
    assert_eq!(config.worklist_order, WorklistOrder::PostOrder);
    assert!(config.transition_relation);
}

#[test]
fn test_unknown_field_rejected() {
    let err = EngineConfig::from_yaml_str("max_structurez: 3\n").unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)));
}

#[test]
fn test_invalid_order_in_yaml_rejected() {
    let err = EngineConfig::from_yaml_str("action_order: fbpu\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidActionOrder { .. }));
    assert!(err.to_string().contains("fbpu"));
}

#[test]
fn test_focus_limit_out_of_range() {
    let err = EngineConfig::from_yaml_str("focus_limit: 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Range { ref field, .. } if field == "focus_limit"));
    assert!(EngineConfig::from_yaml_str("focus_limit: 10000000\n").is_ok());
}

#[test]
fn test_preset_names() {
    for preset in [Preset::Default, Preset::Strict, Preset::Diagnostic] {
        assert_eq!(Preset::from_str(preset.as_str()).unwrap(), preset);
        assert!(EngineConfig::preset(preset).validate().is_ok());
    }
    assert_eq!(Preset::from_str("STRICT").unwrap(), Preset::Strict);
    assert!(matches!(Preset::from_str("fast"), Err(ConfigError::UnknownPreset(_))));
}

#[test]
fn test_yaml_file_roundtrip() {
    let path = std::env::temp_dir().join(format!("tvl_engine_config_{}.yaml", std::process::id()));
    let config = EngineConfig::preset(Preset::Diagnostic).with_max_structures(42);
    std::fs::write(&path, config.to_yaml().unwrap()).unwrap();

    let recovered = EngineConfig::from_yaml_file(&path);
    std::fs::remove_file(&path).ok();
    assert_eq!(recovered.unwrap(), config);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = EngineConfig::from_yaml_file("/nonexistent/tvl/engine.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_validatable_trait_name() {
    let config = EngineConfig::default();
    assert_eq!(Validatable::config_name(&config), "EngineConfig");
    assert!(Validatable::validate(&config).is_ok());
}

// ============================================================================
// Property tests
// ============================================================================

fn action_order_string() -> impl Strategy<Value = (String, ActionOrder)> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(focus, coerce_after_focus, coerce_after_update, blur)| {
            let mut order = String::new();
            if focus {
                order.push('f');
            }
            if coerce_after_focus {
                order.push('c');
            }
            order.push_str("pu");
            if coerce_after_update {
                order.push('c');
            }
            if blur {
                order.push('b');
            }
            let expected = ActionOrder {
                focus,
                coerce_after_focus,
                coerce_after_update,
                blur,
            };
            (order, expected)
        },
    )
}

fn save_locations() -> impl Strategy<Value = SaveLocations> {
    prop_oneof![
        Just(SaveLocations::JoinPoints),
        Just(SaveLocations::Back),
        Just(SaveLocations::Ext),
        Just(SaveLocations::All),
    ]
}

proptest! {
    #[test]
    fn prop_well_formed_orders_parse((order, expected) in action_order_string()) {
        prop_assert_eq!(ActionOrder::parse(&order).unwrap(), expected);
    }

    #[test]
    fn prop_orders_without_update_rejected(order in "[fcb]{0,4}p?[cb]{0,2}") {
        prop_assert!(ActionOrder::parse(&order).is_err());
    }

    #[test]
    fn prop_yaml_roundtrip(
        (order, _) in action_order_string(),
        save in save_locations(),
        max_structures in 0usize..100_000,
        focus_limit in 1usize..=10_000_000,
        strict in any::<bool>(),
        relation in any::<bool>(),
    ) {
        let config = EngineConfig {
            action_order: order,
            save_locations: save,
            max_structures,
            focus_limit,
            break_if_coerce_after_update_failed: strict,
            transition_relation: relation,
            ..EngineConfig::default()
        };
        let yaml = config.to_yaml().unwrap();
        prop_assert_eq!(EngineConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn prop_save_all_dominates(
        incoming in 0usize..5,
        back in any::<bool>(),
        reported in any::<bool>(),
        save in save_locations(),
    ) {
        // All persists whenever any other scheme does; JoinPoints covers Back and Ext
        if save.should_join(incoming, back, reported) {
            prop_assert!(SaveLocations::All.should_join(incoming, back, reported));
        }
        let join_points = SaveLocations::JoinPoints.should_join(incoming, back, reported);
        prop_assert_eq!(
            join_points,
            SaveLocations::Back.should_join(incoming, back, reported)
                || SaveLocations::Ext.should_join(incoming, back, reported)
        );
    }
}
