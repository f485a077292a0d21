//! Operator command protocol
//!
//! Every runtime setting is described by a [`CommandSpec`]: its persisted key,
//! the display name shown in the help listing, its default, and functions to
//! render, apply, encode and decode it. The first whitespace-delimited token of
//! the display name is the command keyword the operator types.
//!
//! The protocol never rejects input. Unknown keywords get the help listing,
//! booleans are "on" only for [`SWITCH_ON`], and numbers are coerced
//! best-effort with garbage becoming `0`.

use censorbot_core::{Error, Result, UserId};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::state::PolicyState;
use crate::store::PolicyStore;

/// Token that switches a boolean setting on
pub const SWITCH_ON: &str = "开";

/// Rendered form of a disabled boolean setting
pub const SWITCH_OFF: &str = "关";

const HELP_HEADER: &str = "命令列表：";

/// Declarative description of one operator-editable setting
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Key in the persisted settings mapping
    pub key: &'static str,

    /// Help line; its first token is the command keyword
    pub display_name: &'static str,

    /// Default value in persisted form
    pub default_value: fn() -> Value,

    /// Render the current value for the operator
    pub render: fn(&PolicyState) -> String,

    /// Apply a raw operator argument; total over any input
    pub apply: fn(&mut PolicyState, &str),

    /// Persisted form of the current value
    pub encode: fn(&PolicyState) -> Value,

    /// Load a persisted value; returns `false` if the value is malformed
    pub decode: fn(&mut PolicyState, &Value) -> bool,
}

impl CommandSpec {
    /// Command keyword used for dispatch
    pub fn keyword(&self) -> &'static str {
        self.display_name
            .split_whitespace()
            .next()
            .unwrap_or(self.display_name)
    }
}

/// Parse an on/off argument; anything but [`SWITCH_ON`] is off
pub fn parse_switch(raw: &str) -> bool {
    raw == SWITCH_ON
}

/// Render a boolean setting
pub fn render_switch(value: bool) -> String {
    let token = if value { SWITCH_ON } else { SWITCH_OFF };
    token.to_string()
}

/// Best-effort integer coercion
///
/// Accepts plain integers and anything `f64` parses (truncated toward zero).
/// Everything else, including the empty string, coerces to `0`.
pub fn coerce_int(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

fn coerce_json_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => Some(coerce_int(s)),
        _ => None,
    }
}

/// The settings table shipped with the bot
pub fn builtin_specs() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            key: "whitelist",
            display_name: "白名单 QQ号",
            default_value: || Value::Array(Vec::new()),
            render: |s| {
                s.whitelist
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            },
            apply: |s, raw| s.toggle_whitelist(coerce_int(raw)),
            encode: |s| Value::Array(s.whitelist.iter().map(|id| Value::from(*id)).collect()),
            decode: |s, v| match v.as_array() {
                Some(items) => {
                    let ids: Option<Vec<UserId>> = items.iter().map(coerce_json_int).collect();
                    match ids {
                        Some(ids) => {
                            s.whitelist = ids.into_iter().collect();
                            true
                        }
                        None => false,
                    }
                }
                None => false,
            },
        },
        CommandSpec {
            key: "revoke",
            display_name: "执行撤回 开/关",
            default_value: || Value::Bool(true),
            render: |s| render_switch(s.revoke),
            apply: |s, raw| s.revoke = parse_switch(raw),
            encode: |s| Value::Bool(s.revoke),
            decode: |s, v| v.as_bool().map(|b| s.revoke = b).is_some(),
        },
        CommandSpec {
            key: "censorAll",
            display_name: "审查所有 开/关",
            default_value: || Value::Bool(false),
            render: |s| render_switch(s.censor_all),
            apply: |s, raw| s.censor_all = parse_switch(raw),
            encode: |s| Value::Bool(s.censor_all),
            decode: |s, v| v.as_bool().map(|b| s.censor_all = b).is_some(),
        },
        CommandSpec {
            key: "moreSensitive",
            display_name: "处理疑似 开/关",
            default_value: || Value::Bool(false),
            render: |s| render_switch(s.more_sensitive),
            apply: |s, raw| s.more_sensitive = parse_switch(raw),
            encode: |s| Value::Bool(s.more_sensitive),
            decode: |s, v| v.as_bool().map(|b| s.more_sensitive = b).is_some(),
        },
        CommandSpec {
            key: "minLength",
            display_name: "文本长度 数字",
            default_value: || Value::from(8),
            render: |s| s.min_length.to_string(),
            apply: |s, raw| s.min_length = coerce_int(raw),
            encode: |s| Value::from(s.min_length),
            decode: |s, v| coerce_json_int(v).map(|n| s.min_length = n).is_some(),
        },
    ]
}

/// A parsed operator message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInput<'a> {
    pub keyword: &'a str,
    pub argument: Option<&'a str>,
}

impl<'a> CommandInput<'a> {
    /// Split operator text into keyword and optional argument
    ///
    /// Tokens after the argument are ignored.
    pub fn parse(text: &'a str) -> Self {
        let mut tokens = text.split_whitespace();
        Self {
            keyword: tokens.next().unwrap_or_default(),
            argument: tokens.next(),
        }
    }
}

/// How a command was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Keyword not recognized, help listing returned
    Help,
    /// Current value reported, nothing changed
    Current,
    /// Setting changed and saved
    Updated,
    /// Setting changed in memory but saving failed
    UpdatedUnsaved,
}

/// Reply to an operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub kind: ReplyKind,
    pub text: String,
}

/// Registry of command descriptors
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
}

impl CommandRegistry {
    /// Create a registry, rejecting duplicate keys or keywords
    pub fn new(specs: Vec<CommandSpec>) -> Result<Self> {
        let mut keys = HashSet::new();
        let mut keywords = HashSet::new();
        for spec in &specs {
            if !keys.insert(spec.key) {
                return Err(Error::config(format!("duplicate setting key '{}'", spec.key)));
            }
            if !keywords.insert(spec.keyword()) {
                return Err(Error::config(format!(
                    "duplicate command keyword '{}'",
                    spec.keyword()
                )));
            }
        }
        Ok(Self { specs })
    }

    /// Registry with the built-in settings table
    pub fn builtin() -> Self {
        Self {
            specs: builtin_specs(),
        }
    }

    /// All descriptors in display order
    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    /// Look up a descriptor by persisted key
    pub fn by_key(&self, key: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.key == key)
    }

    /// Look up a descriptor by command keyword (exact, case-sensitive)
    pub fn by_keyword(&self, keyword: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.keyword() == keyword)
    }

    /// Full help listing
    pub fn help(&self) -> String {
        let mut lines = vec![HELP_HEADER];
        lines.extend(self.specs.iter().map(|spec| spec.display_name));
        lines.join("\n")
    }

    /// Policy state with every setting at its default
    pub fn defaults(&self) -> PolicyState {
        let mut state = PolicyState::blank();
        for spec in &self.specs {
            if !(spec.decode)(&mut state, &(spec.default_value)()) {
                warn!(key = spec.key, "Default value does not decode");
            }
        }
        state
    }

    /// Persisted form of `state`
    pub fn encode(&self, state: &PolicyState) -> Map<String, Value> {
        self.specs
            .iter()
            .map(|spec| (spec.key.to_string(), (spec.encode)(state)))
            .collect()
    }

    /// Merge a persisted mapping onto the defaults
    ///
    /// Unknown keys are ignored; missing or malformed keys keep their default.
    pub fn decode(&self, settings: &Map<String, Value>) -> PolicyState {
        let mut state = self.defaults();
        for spec in &self.specs {
            let Some(value) = settings.get(spec.key) else {
                continue;
            };
            if !(spec.decode)(&mut state, value) {
                warn!(key = spec.key, value = %value, "Ignoring malformed setting");
                let default = (spec.default_value)();
                (spec.decode)(&mut state, &default);
            }
        }
        state
    }

    /// Handle one operator message against the store
    pub fn respond(&self, store: &mut PolicyStore, text: &str) -> CommandReply {
        let input = CommandInput::parse(text);
        let Some(spec) = self.by_keyword(input.keyword) else {
            debug!(keyword = input.keyword, "Unknown command, replying with help");
            return CommandReply {
                kind: ReplyKind::Help,
                text: self.help(),
            };
        };

        let keyword = spec.keyword();
        match input.argument {
            None => CommandReply {
                kind: ReplyKind::Current,
                text: format!("{} - 当前设定值为{}", keyword, (spec.render)(store.state())),
            },
            Some(argument) => match store.set(spec.key, argument) {
                Ok(()) => CommandReply {
                    kind: ReplyKind::Updated,
                    text: format!("{} - 设定修改成功", keyword),
                },
                Err(e) => {
                    warn!(key = spec.key, error = %e, "Setting changed but not saved");
                    CommandReply {
                        kind: ReplyKind::UpdatedUnsaved,
                        text: format!("{} - 设定已生效，但保存失败：{}", keyword, e),
                    }
                }
            },
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
