//! Builds a nested, human-readable JSON presentation of a config, for printing or for exposing
//! over a status endpoint. Unlike [`crate::dumping::SerializeConfig::dump`], which returns a flat
//! map of dotted paths, this module reconstructs the nested JSON shape and can redact private
//! fields.

use std::ops::IndexMut;

use serde_json::{json, Value};

use crate::dumping::SerializeConfig;
use crate::{ConfigError, FIELD_SEPARATOR, IS_NONE_MARK};

/// Returns a nested JSON presentation of `config`. When `include_private` is `false`, parameters
/// marked [`crate::ParamPrivacyInput::Private`] are omitted from the result.
pub fn get_config_presentation<T: SerializeConfig>(
    config: &T,
    include_private: bool,
) -> Result<Value, ConfigError> {
    let mut nested = json!({});
    for (param_path, serialized_param) in config.dump() {
        if serialized_param.is_private() && !include_private {
            continue;
        }
        if param_path.ends_with(&format!("{FIELD_SEPARATOR}{IS_NONE_MARK}")) {
            continue;
        }
        let value = match &serialized_param.content {
            crate::SerializedContent::DefaultValue(value) => value.clone(),
            crate::SerializedContent::PointerTarget(target) => json!(target),
            crate::SerializedContent::ParamType(ty) => json!(ty.to_string()),
        };
        let mut entry = &mut nested;
        for segment in param_path.split(FIELD_SEPARATOR) {
            entry = entry.index_mut(segment);
        }
        *entry = value;
    }
    Ok(nested)
}
