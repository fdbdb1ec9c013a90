use std::collections::{BTreeMap, HashSet};
use std::fs::File;

use assert_matches::assert_matches;
use clap::Command;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;
use validator::Validate;

use crate::dumping::{
    combine_config_map_and_pointers,
    generate_struct_pointer,
    prepend_sub_config_name,
    ser_optional_param,
    ser_optional_sub_config,
    ser_param,
    ser_required_param,
    set_pointing_param_paths,
    SerializeConfig,
};
use crate::loading::{load, load_and_process_config};
use crate::presentation::get_config_presentation;
use crate::{ConfigError, ParamPath, ParamPrivacyInput, SerializationType, SerializedParam};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Validate)]
struct InnerConfig {
    inner_param: usize,
}

impl SerializeConfig for InnerConfig {
    fn dump(&self) -> BTreeMap<ParamPath, SerializedParam> {
        BTreeMap::from([ser_param(
            "inner_param",
            &self.inner_param,
            "An inner parameter.",
            ParamPrivacyInput::Public,
        )])
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Validate)]
struct TypicalConfig {
    a: usize,
    b: String,
    c: usize,
    d: bool,
    inner_config: InnerConfig,
    opt_config: Option<InnerConfig>,
    opt_elem: Option<usize>,
}

impl Default for TypicalConfig {
    fn default() -> Self {
        Self {
            a: 1,
            b: "default".to_owned(),
            c: 7,
            d: true,
            inner_config: InnerConfig::default(),
            opt_config: None,
            opt_elem: Some(5),
        }
    }
}

impl SerializeConfig for TypicalConfig {
    fn dump(&self) -> BTreeMap<ParamPath, SerializedParam> {
        let mut dump = BTreeMap::from([
            ser_param("a", &self.a, "Param a.", ParamPrivacyInput::Public),
            ser_param("b", &self.b, "Param b.", ParamPrivacyInput::Public),
            ser_param("c", &self.c, "Param c.", ParamPrivacyInput::Private),
            ser_param("d", &self.d, "Param d.", ParamPrivacyInput::Public),
        ]);
        dump.extend(prepend_sub_config_name(self.inner_config.dump(), "inner_config"));
        dump.extend(ser_optional_sub_config(&self.opt_config, "opt_config"));
        dump.extend(ser_optional_param(
            &self.opt_elem,
            0,
            "opt_elem",
            "An optional element.",
            ParamPrivacyInput::Public,
        ));
        dump
    }
}

#[test]
fn test_dump_and_load_round_trip() {
    let config = TypicalConfig::default();
    let dumped = config.dump();
    let (values_map, _types_map) = crate::loading::split_values_and_types(
        dumped.into_iter().filter(|(_, p)| !matches!(
            p.content, crate::SerializedContent::PointerTarget(_)
        )).collect(),
    );
    let mut values_map = values_map;
    crate::loading::update_optional_values(&mut values_map);
    let loaded: TypicalConfig = load(&values_map).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_presentation() {
    let config = TypicalConfig::default();
    let public_presentation = get_config_presentation(&config, false).unwrap();
    let private_presentation = get_config_presentation(&config, true).unwrap();

    let public_keys: HashSet<String> =
        public_presentation.as_object().unwrap().keys().cloned().collect();
    let private_keys: HashSet<String> =
        private_presentation.as_object().unwrap().keys().cloned().collect();

    assert!(!public_keys.contains("c"));
    assert!(private_keys.contains("c"));
    for key in ["a", "b", "d"] {
        assert!(public_keys.contains(key));
    }
}

#[test]
fn test_nested_config_presentation() {
    let config = TypicalConfig::default();
    let presentation = get_config_presentation(&config, true).unwrap();
    let as_object = presentation.as_object().unwrap();
    assert!(as_object.contains_key("inner_config"));
    assert!(as_object.contains_key("opt_config"));
    assert!(as_object.contains_key("opt_elem"));
    assert_eq!(
        as_object["inner_config"]["inner_param"],
        json!(InnerConfig::default().inner_param)
    );
}

#[test]
fn test_load_and_process_config_from_file() {
    let config = TypicalConfig::default();
    let dir = TempDir::new().unwrap();
    let file_path = dir.path().join("config.json");
    config
        .dump_to_file(&vec![], &HashSet::new(), file_path.to_str().unwrap())
        .unwrap();
    let file = File::open(&file_path).unwrap();
    let loaded = load_and_process_config::<TypicalConfig>(
        file,
        Command::new("Program"),
        vec!["Program".to_owned(), "--b".to_owned(), "overridden".to_owned()],
        false,
    )
    .unwrap();
    assert_eq!(loaded.b, "overridden");
    assert_eq!(loaded.a, config.a);
}

#[test]
fn test_pointers_are_resolved() {
    let target_prefix = "shared".to_owned();
    let pointer_prefixes = set_pointing_param_paths(&["inner_config", "other_inner_config"]);
    let pointers =
        generate_struct_pointer(target_prefix, &InnerConfig::default(), pointer_prefixes);

    let mut config_map = BTreeMap::new();
    config_map.extend(prepend_sub_config_name(InnerConfig::default().dump(), "inner_config"));
    config_map.extend(prepend_sub_config_name(InnerConfig::default().dump(), "other_inner_config"));

    let combined = combine_config_map_and_pointers(config_map, &pointers, &HashSet::new())
        .unwrap();
    assert!(combined.is_object());
}

#[test]
fn test_required_param_must_be_supplied() {
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    struct RequiresValue {
        required: usize,
    }
    impl SerializeConfig for RequiresValue {
        fn dump(&self) -> BTreeMap<ParamPath, SerializedParam> {
            BTreeMap::from([ser_required_param(
                "required",
                SerializationType::PositiveInteger,
                "Must be supplied.",
                ParamPrivacyInput::Public,
            )])
        }
    }

    let dummy = RequiresValue { required: 0 };
    let dump = dummy.dump();
    let serialized_param = dump.get("required").unwrap();
    assert!(serialized_param.is_required());
}

#[test]
fn test_empty_schema_file_fails_to_parse() {
    let result = load_and_process_config::<TypicalConfig>(
        tempfile::tempfile().unwrap(),
        Command::new("Program"),
        vec!["Program".to_owned()],
        false,
    );
    assert_matches!(result, Err(ConfigError::MissingParam(_)));
}

#[test]
fn test_custom_config_file_not_found() {
    let config = TypicalConfig::default();
    let dir = TempDir::new().unwrap();
    let schema_path = dir.path().join("schema.json");
    config.dump_to_file(&vec![], &HashSet::new(), schema_path.to_str().unwrap()).unwrap();
    let schema_file = File::open(&schema_path).unwrap();
    let result = load_and_process_config::<TypicalConfig>(
        schema_file,
        Command::new("Program"),
        vec![
            "Program".to_owned(),
            "--config_file".to_owned(),
            "/no/such/file.json".to_owned(),
        ],
        false,
    );
    assert_matches!(result, Err(ConfigError::IOError(_)));
}

