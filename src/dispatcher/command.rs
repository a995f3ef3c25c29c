//! The action table and the typed decode step for each action.

use serde_json::Value as JsonValue;

use crate::codec::{to_string_mapping, to_value_mapping, wire_type_name, NativeValue, StringMap, ValueMap, WireArgs, WireValue};
use crate::container::ContainerValueKind;
use crate::error::{malformed_arguments, BridgeResult};
use crate::tracker::{fields, hit};

/// Actions the bridge understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    SetTrackingId,
    SetTrackingIds,
    SetDispatchInterval,
    SetLogLevel,
    SetIdfaEnabled,
    Get,
    Set,
    Send,
    Close,
    SetAppOptOut,
    GetAppOptOut,
    ContainerOpen,
    ContainerRefresh,
    GetContainerString,
    GetContainerBool,
    GetContainerLong,
    GetContainerDouble,
    DataLayerValue,
    DataLayerPush,
    DataLayerPushEvent,
    CustomDimension,
    CustomMetric,
    SendEvent,
    SendAppView,
    SendException,
}

/// Wire names, canonical name first for each action.
const ACTIONS: &[(&str, Action)] = &[
    ("setTrackingId", Action::SetTrackingId),
    ("setTrackingIds", Action::SetTrackingIds),
    ("setDispatchInterval", Action::SetDispatchInterval),
    ("setLogLevel", Action::SetLogLevel),
    ("setIDFAEnabled", Action::SetIdfaEnabled),
    ("get", Action::Get),
    ("set", Action::Set),
    ("send", Action::Send),
    ("close", Action::Close),
    ("setAppOptOut", Action::SetAppOptOut),
    ("getAppOptOut", Action::GetAppOptOut),
    ("containerOpen", Action::ContainerOpen),
    ("openContainer", Action::ContainerOpen),
    ("containerRefresh", Action::ContainerRefresh),
    ("getContainerString", Action::GetContainerString),
    ("getContainerBool", Action::GetContainerBool),
    ("getContainerBoolean", Action::GetContainerBool),
    ("getContainerLong", Action::GetContainerLong),
    ("getContainerDouble", Action::GetContainerDouble),
    ("dataLayerValue", Action::DataLayerValue),
    ("getDatalayer", Action::DataLayerValue),
    ("dataLayerPush", Action::DataLayerPush),
    ("dataLayerPushEvent", Action::DataLayerPushEvent),
    ("customDimension", Action::CustomDimension),
    ("customMetric", Action::CustomMetric),
    ("sendEvent", Action::SendEvent),
    ("sendAppView", Action::SendAppView),
    ("sendException", Action::SendException),
];

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        ACTIONS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, action)| *action)
    }

    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        ACTIONS
            .iter()
            .find(|(_, action)| action == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Every accepted wire name, aliases included.
    pub fn names() -> impl Iterator<Item = &'static str> {
        ACTIONS.iter().map(|(name, _)| *name)
    }

    /// Turns positional wire arguments into a typed command.
    pub fn decode(&self, values: &[WireValue]) -> BridgeResult<Command> {
        let args = WireArgs::new(self.name(), values);
        let command = match self {
            Action::SetTrackingId => Command::Inline(InlineCommand::SetTrackingId(args.string(0)?)),
            Action::SetTrackingIds => Command::Inline(InlineCommand::SetTrackingIds(tracking_ids(&args)?)),
            Action::SetDispatchInterval => {
                let seconds = args.int(0)?;
                let seconds = u64::try_from(seconds)
                    .map_err(|_| malformed_arguments("setDispatchInterval: seconds must not be negative"))?;
                Command::Inline(InlineCommand::SetDispatchInterval(seconds))
            }
            Action::SetLogLevel => Command::Inline(InlineCommand::SetLogLevel(args.int(0)?)),
            Action::SetIdfaEnabled => Command::Inline(InlineCommand::SetAdvertisingIdCollection(
                args.optional_bool(0)?.unwrap_or(true),
            )),
            Action::Get => Command::Inline(InlineCommand::Get(args.string(0)?)),
            Action::Set => Command::Inline(InlineCommand::Set {
                key: args.string(0)?,
                value: args.optional_string(1)?,
            }),
            Action::Send => Command::Background(BackgroundCommand::Send(to_string_mapping(Some(args.object(0)?)))),
            Action::Close => Command::Background(BackgroundCommand::Close),
            Action::SetAppOptOut => Command::Inline(InlineCommand::SetAppOptOut(args.bool(0)?)),
            Action::GetAppOptOut => Command::Inline(InlineCommand::GetAppOptOut),
            Action::ContainerOpen => Command::Background(BackgroundCommand::OpenContainer(args.string(0)?)),
            Action::ContainerRefresh => Command::Background(BackgroundCommand::RefreshContainer),
            Action::GetContainerString => container_read(&args, ContainerValueKind::String)?,
            Action::GetContainerBool => container_read(&args, ContainerValueKind::Bool)?,
            Action::GetContainerLong => container_read(&args, ContainerValueKind::Long)?,
            Action::GetContainerDouble => container_read(&args, ContainerValueKind::Double)?,
            Action::DataLayerValue => Command::Background(BackgroundCommand::DataLayerValue(args.string(0)?)),
            Action::DataLayerPush => Command::Background(BackgroundCommand::DataLayerPush(data_layer_update(&args)?)),
            Action::DataLayerPushEvent => Command::Background(BackgroundCommand::DataLayerPushEvent {
                name: args.string(0)?,
                updates: to_value_mapping(Some(args.object(1)?)),
            }),
            Action::CustomDimension => Command::Inline(InlineCommand::Set {
                key: fields::custom_dimension(custom_index(&args)?),
                value: args.optional_string(1)?,
            }),
            Action::CustomMetric => Command::Inline(InlineCommand::Set {
                key: fields::custom_metric(custom_index(&args)?),
                value: args.optional_string(1)?,
            }),
            Action::SendEvent => {
                let label = args.optional_string(2)?;
                let hit = hit::event(&args.string(0)?, &args.string(1)?, label.as_deref(), args.optional_int(3)?);
                Command::Background(BackgroundCommand::Send(hit.build()))
            }
            Action::SendAppView => {
                Command::Background(BackgroundCommand::Send(hit::app_view(&args.string(0)?).build()))
            }
            Action::SendException => {
                let fatal = args.optional_bool(1)?.unwrap_or(false);
                Command::Background(BackgroundCommand::Send(hit::exception(&args.string(0)?, fatal).build()))
            }
        };
        Ok(command)
    }
}

/// A decoded call, split by where it runs.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Inline(InlineCommand),
    Background(BackgroundCommand),
}

/// Runs on the calling thread.
#[derive(Clone, Debug, PartialEq)]
pub enum InlineCommand {
    SetTrackingId(String),
    SetTrackingIds(Vec<String>),
    SetDispatchInterval(u64),
    /// Raw wire code; mapped with the host platform's scale when executed.
    SetLogLevel(i64),
    SetAdvertisingIdCollection(bool),
    Get(String),
    Set { key: String, value: Option<String> },
    SetAppOptOut(bool),
    GetAppOptOut,
    GetContainerValue { key: String, kind: ContainerValueKind },
}

/// Runs on the worker pool.
#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundCommand {
    Send(StringMap),
    Close,
    OpenContainer(String),
    RefreshContainer,
    DataLayerValue(String),
    DataLayerPush(DataLayerUpdate),
    DataLayerPushEvent { name: String, updates: ValueMap },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataLayerUpdate {
    Mapping(ValueMap),
    KeyValue(String, NativeValue),
}

fn tracking_ids(args: &WireArgs<'_>) -> BridgeResult<Vec<String>> {
    let values = match args.values() {
        [JsonValue::Array(items)] => items.as_slice(),
        values => values,
    };
    values
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            JsonValue::String(id) if !id.trim().is_empty() => Ok(id.clone()),
            other => Err(malformed_arguments(format!(
                "setTrackingIds: tracking id {index} must be a non-empty string, got {}",
                wire_type_name(other)
            ))),
        })
        .collect()
}

fn container_read(args: &WireArgs<'_>, kind: ContainerValueKind) -> BridgeResult<Command> {
    Ok(Command::Inline(InlineCommand::GetContainerValue {
        key: args.string(0)?,
        kind,
    }))
}

fn data_layer_update(args: &WireArgs<'_>) -> BridgeResult<DataLayerUpdate> {
    match args.get(0) {
        Some(JsonValue::Object(map)) => Ok(DataLayerUpdate::Mapping(to_value_mapping(Some(map)))),
        Some(JsonValue::String(key)) => {
            let value = args.get(1).map(NativeValue::from_wire).unwrap_or(NativeValue::Null);
            Ok(DataLayerUpdate::KeyValue(key.clone(), value))
        }
        other => Err(malformed_arguments(format!(
            "dataLayerPush: expected an object or a key and value, got {}",
            other.map(wire_type_name).unwrap_or("nothing")
        ))),
    }
}

fn custom_index(args: &WireArgs<'_>) -> BridgeResult<u32> {
    let index = args.int(0)?;
    u32::try_from(index)
        .ok()
        .filter(|index| *index >= 1)
        .ok_or_else(|| malformed_arguments(format!("custom index must be a positive integer, got {index}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_resolve_to_the_same_action() {
        assert_eq!(Action::from_name("openContainer"), Some(Action::ContainerOpen));
        assert_eq!(Action::from_name("getContainerBoolean"), Some(Action::GetContainerBool));
        assert_eq!(Action::from_name("getDatalayer"), Some(Action::DataLayerValue));
        assert_eq!(Action::ContainerOpen.name(), "containerOpen");
        assert_eq!(Action::from_name("sendTiming"), None);
    }

    #[test]
    fn every_name_round_trips() {
        for name in Action::names() {
            let action = Action::from_name(name).unwrap();
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
    }

    #[test]
    fn tracking_ids_accept_an_array_or_spread_strings() {
        let expected = Command::Inline(InlineCommand::SetTrackingIds(vec!["A".into(), "B".into()]));
        assert_eq!(Action::SetTrackingIds.decode(&[json!(["A", "B"])]).unwrap(), expected);
        assert_eq!(Action::SetTrackingIds.decode(&[json!("A"), json!("B")]).unwrap(), expected);
        assert!(Action::SetTrackingIds.decode(&[json!(["A", 3])]).is_err());
    }

    #[test]
    fn single_and_multi_tracker_setup_decode_apart() {
        assert_eq!(
            Action::SetTrackingId.decode(&[json!("UA-1")]).unwrap(),
            Command::Inline(InlineCommand::SetTrackingId("UA-1".into()))
        );
        assert_eq!(
            Action::SetTrackingIds.decode(&[json!(["UA-1"])]).unwrap(),
            Command::Inline(InlineCommand::SetTrackingIds(vec!["UA-1".into()]))
        );
    }

    #[test]
    fn send_requires_a_hit_object() {
        for args in [vec![], vec![json!(null)], vec![json!("hit")]] {
            let err = Action::Send.decode(&args).unwrap_err();
            assert_eq!(err.code_str(), "bridge/malformed-arguments", "{args:?}");
        }
        assert!(Action::Send.decode(&[json!({"&t": "event"})]).is_ok());
    }

    #[test]
    fn data_layer_event_requires_an_update_object() {
        for args in [vec![json!("purchase")], vec![json!("purchase"), json!(null)]] {
            let err = Action::DataLayerPushEvent.decode(&args).unwrap_err();
            assert_eq!(err.message(), format!(
                "dataLayerPushEvent: argument 1 must be an object, got {}",
                if args.len() == 1 { "nothing" } else { "null" }
            ));
        }
        assert!(Action::DataLayerPushEvent.decode(&[json!("purchase"), json!({})]).is_ok());
    }

    #[test]
    fn set_accepts_null_values() {
        let command = Action::Set.decode(&[json!("userId"), json!(null)]).unwrap();
        assert_eq!(
            command,
            Command::Inline(InlineCommand::Set {
                key: "userId".into(),
                value: None
            })
        );
    }

    #[test]
    fn negative_dispatch_interval_is_malformed() {
        let err = Action::SetDispatchInterval.decode(&[json!(-5)]).unwrap_err();
        assert_eq!(err.code_str(), "bridge/malformed-arguments");
    }

    #[test]
    fn data_layer_push_takes_object_or_key_value() {
        let command = Action::DataLayerPush.decode(&[json!({"a": 1})]).unwrap();
        assert_eq!(
            command,
            Command::Background(BackgroundCommand::DataLayerPush(DataLayerUpdate::Mapping(ValueMap::from([(
                "a".to_string(),
                NativeValue::Int(1)
            )]))))
        );
        let command = Action::DataLayerPush.decode(&[json!("score"), json!(1.5)]).unwrap();
        assert_eq!(
            command,
            Command::Background(BackgroundCommand::DataLayerPush(DataLayerUpdate::KeyValue(
                "score".into(),
                NativeValue::Double(1.5)
            )))
        );
        assert!(Action::DataLayerPush.decode(&[json!(3)]).is_err());
    }

    #[test]
    fn custom_dimension_targets_numbered_key() {
        let command = Action::CustomDimension.decode(&[json!(3), json!("gold")]).unwrap();
        assert_eq!(
            command,
            Command::Inline(InlineCommand::Set {
                key: "cd3".into(),
                value: Some("gold".into())
            })
        );
        assert!(Action::CustomMetric.decode(&[json!(0), json!("1")]).is_err());
    }

    #[test]
    fn send_event_builds_an_event_hit() {
        let Command::Background(BackgroundCommand::Send(hit)) =
            Action::SendEvent.decode(&[json!("ui"), json!("click"), json!(null), json!(4)]).unwrap()
        else {
            panic!("expected a send command");
        };
        assert_eq!(hit.get(fields::EVENT_VALUE), Some(&Some("4".to_string())));
        assert_eq!(hit.get(fields::EVENT_LABEL), Some(&Some(String::new())));
    }

    fn runs_in_background(action: Action) -> bool {
        matches!(
            action,
            Action::Send
                | Action::Close
                | Action::ContainerOpen
                | Action::ContainerRefresh
                | Action::DataLayerValue
                | Action::DataLayerPush
                | Action::DataLayerPushEvent
                | Action::SendEvent
                | Action::SendAppView
                | Action::SendException
        )
    }

    #[test]
    fn background_flags_match_the_execution_model() {
        assert!(runs_in_background(Action::Send));
        assert!(runs_in_background(Action::Close));
        assert!(runs_in_background(Action::ContainerOpen));
        assert!(runs_in_background(Action::DataLayerPushEvent));
        assert!(!runs_in_background(Action::Get));
        assert!(!runs_in_background(Action::GetContainerString));
        for name in Action::names() {
            let action = Action::from_name(name).unwrap();
            let decoded = action.decode(&sample_args(action));
            if let Ok(command) = decoded {
                assert_eq!(
                    matches!(command, Command::Background(_)),
                    runs_in_background(action),
                    "{name}"
                );
            }
        }
    }

    fn sample_args(action: Action) -> Vec<WireValue> {
        match action {
            Action::SetDispatchInterval | Action::SetLogLevel => vec![json!(1)],
            Action::CustomDimension | Action::CustomMetric => vec![json!(1), json!("v")],
            Action::SetAppOptOut => vec![json!(true)],
            Action::Send => vec![json!({})],
            Action::SendEvent => vec![json!("c"), json!("a")],
            Action::DataLayerPushEvent => vec![json!("e"), json!({})],
            _ => vec![json!("x")],
        }
    }
}
