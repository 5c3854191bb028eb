//! Alarm and condition field layout
//!
//! Condition nodes (e.g. `FailureAlarmType` instances) carry the event and
//! condition fields as child variables. [`ConditionFields`] is a typed
//! snapshot of those fields; raising and acknowledging are driven by the
//! caller, which writes a new snapshot to the node.
//!
//! Two-state fields (EnabledState, AckedState, ActiveState) are stored as a
//! LocalizedText variable with a Boolean `Id` child.

use di_core::{DiError, DiResult, LocalizedText, NodeId, Variant};

/// Path of a field below the condition node, as browse names in the base namespace
pub type FieldPath = &'static [&'static str];

pub const EVENT_ID: FieldPath = &["EventId"];
pub const EVENT_TYPE: FieldPath = &["EventType"];
pub const SOURCE_NODE: FieldPath = &["SourceNode"];
pub const SOURCE_NAME: FieldPath = &["SourceName"];
pub const TIME: FieldPath = &["Time"];
pub const RECEIVE_TIME: FieldPath = &["ReceiveTime"];
pub const MESSAGE: FieldPath = &["Message"];
pub const SEVERITY: FieldPath = &["Severity"];
pub const CONDITION_NAME: FieldPath = &["ConditionName"];
pub const BRANCH_ID: FieldPath = &["BranchId"];
pub const RETAIN: FieldPath = &["Retain"];
pub const ENABLED_STATE: FieldPath = &["EnabledState"];
pub const ENABLED_STATE_ID: FieldPath = &["EnabledState", "Id"];
pub const ACKED_STATE: FieldPath = &["AckedState"];
pub const ACKED_STATE_ID: FieldPath = &["AckedState", "Id"];
pub const ACTIVE_STATE: FieldPath = &["ActiveState"];
pub const ACTIVE_STATE_ID: FieldPath = &["ActiveState", "Id"];

/// Every field path, in the order [`ConditionFields::field_values`] lists them
pub const FIELD_PATHS: [FieldPath; 17] = [
    EVENT_ID,
    EVENT_TYPE,
    SOURCE_NODE,
    SOURCE_NAME,
    TIME,
    RECEIVE_TIME,
    MESSAGE,
    SEVERITY,
    CONDITION_NAME,
    BRANCH_ID,
    RETAIN,
    ENABLED_STATE,
    ENABLED_STATE_ID,
    ACKED_STATE,
    ACKED_STATE_ID,
    ACTIVE_STATE,
    ACTIVE_STATE_ID,
];

pub const SEVERITY_MIN: u16 = 1;
pub const SEVERITY_MAX: u16 = 1000;

/// Snapshot of the fields of a condition
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionFields {
    pub event_id: Vec<u8>,
    pub event_type: NodeId,
    pub source_node: NodeId,
    pub source_name: String,
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub receive_time: i64,
    pub message: LocalizedText,
    pub severity: u16,
    pub condition_name: String,
    pub branch_id: NodeId,
    pub retain: bool,
    pub enabled: bool,
    pub acked: bool,
    pub active: bool,
}

impl ConditionFields {
    /// Enabled, inactive and acknowledged condition of `event_type`
    pub fn new(event_type: NodeId, source_node: NodeId, source_name: impl Into<String>) -> Self {
        Self {
            event_id: Vec::new(),
            event_type,
            source_node,
            source_name: source_name.into(),
            time: 0,
            receive_time: 0,
            message: LocalizedText::default(),
            severity: SEVERITY_MIN,
            condition_name: String::new(),
            branch_id: NodeId::null(),
            retain: false,
            enabled: true,
            acked: true,
            active: false,
        }
    }

    /// Set the severity, clamped to 1..=1000
    pub fn with_severity(mut self, severity: u16) -> Self {
        self.severity = severity.clamp(SEVERITY_MIN, SEVERITY_MAX);
        self
    }

    pub fn with_message(mut self, message: impl Into<LocalizedText>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_condition_name(mut self, name: impl Into<String>) -> Self {
        self.condition_name = name.into();
        self
    }

    /// Field values keyed by their path below the condition node
    pub fn field_values(&self) -> Vec<(FieldPath, Variant)> {
        vec![
            (EVENT_ID, Variant::ByteString(self.event_id.clone())),
            (EVENT_TYPE, Variant::NodeId(self.event_type.clone())),
            (SOURCE_NODE, Variant::NodeId(self.source_node.clone())),
            (SOURCE_NAME, Variant::String(self.source_name.clone())),
            (TIME, Variant::DateTime(self.time)),
            (RECEIVE_TIME, Variant::DateTime(self.receive_time)),
            (MESSAGE, Variant::LocalizedText(self.message.clone())),
            (SEVERITY, Variant::UInt16(self.severity)),
            (CONDITION_NAME, Variant::String(self.condition_name.clone())),
            (BRANCH_ID, Variant::NodeId(self.branch_id.clone())),
            (RETAIN, Variant::Boolean(self.retain)),
            (ENABLED_STATE, two_state_text(self.enabled, "Enabled", "Disabled")),
            (ENABLED_STATE_ID, Variant::Boolean(self.enabled)),
            (ACKED_STATE, two_state_text(self.acked, "Acknowledged", "Unacknowledged")),
            (ACKED_STATE_ID, Variant::Boolean(self.acked)),
            (ACTIVE_STATE, two_state_text(self.active, "Active", "Inactive")),
            (ACTIVE_STATE_ID, Variant::Boolean(self.active)),
        ]
    }

    /// Rebuild a snapshot from field values read off a condition node
    ///
    /// Two-state fields are taken from their `Id` child.
    ///
    /// # Errors
    /// Returns `DiError::InvalidData` if a field is missing or has the wrong type
    pub fn from_values(values: &[(FieldPath, Variant)]) -> DiResult<Self> {
        let get = |path: FieldPath| {
            values
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, v)| v)
                .ok_or_else(|| DiError::InvalidData(format!("Missing condition field {}", path.join("/"))))
        };

        Ok(Self {
            event_id: get(EVENT_ID)?.as_bytes()?.to_vec(),
            event_type: node_id(get(EVENT_TYPE)?)?,
            source_node: node_id(get(SOURCE_NODE)?)?,
            source_name: get(SOURCE_NAME)?.as_str()?.to_string(),
            time: date_time(get(TIME)?)?,
            receive_time: date_time(get(RECEIVE_TIME)?)?,
            message: match get(MESSAGE)? {
                Variant::LocalizedText(text) => text.clone(),
                other => return Err(mismatch("Message", other)),
            },
            severity: match get(SEVERITY)? {
                Variant::UInt16(severity) => *severity,
                other => return Err(mismatch("Severity", other)),
            },
            condition_name: get(CONDITION_NAME)?.as_str()?.to_string(),
            branch_id: node_id(get(BRANCH_ID)?)?,
            retain: get(RETAIN)?.as_bool()?,
            enabled: get(ENABLED_STATE_ID)?.as_bool()?,
            acked: get(ACKED_STATE_ID)?.as_bool()?,
            active: get(ACTIVE_STATE_ID)?.as_bool()?,
        })
    }
}

fn two_state_text(state: bool, true_state: &str, false_state: &str) -> Variant {
    Variant::LocalizedText(LocalizedText::new("en", if state { true_state } else { false_state }))
}

fn node_id(value: &Variant) -> DiResult<NodeId> {
    match value {
        Variant::NodeId(id) => Ok(id.clone()),
        other => Err(mismatch("NodeId", other)),
    }
}

fn date_time(value: &Variant) -> DiResult<i64> {
    match value {
        Variant::DateTime(ms) => Ok(*ms),
        other => Err(mismatch("DateTime", other)),
    }
}

fn mismatch(field: &str, value: &Variant) -> DiError {
    DiError::InvalidData(format!("Unexpected {:?} for condition field {}", value.get_type(), field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure_alarm() -> ConditionFields {
        ConditionFields::new(NodeId::numeric(1, 15292), NodeId::numeric(2, 7), "Pump01")
            .with_severity(800)
            .with_message("Bearing temperature too high")
            .with_condition_name("Overtemperature")
    }

    #[test]
    fn test_new_condition_defaults() {
        let fields = ConditionFields::new(NodeId::numeric(1, 15292), NodeId::numeric(2, 7), "Pump01");
        assert!(fields.enabled);
        assert!(fields.acked);
        assert!(!fields.active);
        assert_eq!(fields.severity, SEVERITY_MIN);
    }

    #[test]
    fn test_severity_is_clamped() {
        let fields = failure_alarm().with_severity(5000);
        assert_eq!(fields.severity, SEVERITY_MAX);
        let fields = failure_alarm().with_severity(0);
        assert_eq!(fields.severity, SEVERITY_MIN);
    }

    #[test]
    fn test_field_values_cover_every_path() {
        let values = failure_alarm().field_values();
        let paths: Vec<FieldPath> = values.iter().map(|(p, _)| *p).collect();
        assert_eq!(paths, FIELD_PATHS.to_vec());
    }

    #[test]
    fn test_two_state_fields() {
        let mut fields = failure_alarm();
        fields.active = true;
        fields.acked = false;
        let values = fields.field_values();
        let lookup = |path: FieldPath| values.iter().find(|(p, _)| *p == path).map(|(_, v)| v.clone());

        assert_eq!(
            lookup(ACTIVE_STATE),
            Some(Variant::LocalizedText(LocalizedText::new("en", "Active")))
        );
        assert_eq!(lookup(ACTIVE_STATE_ID), Some(Variant::Boolean(true)));
        assert_eq!(
            lookup(ACKED_STATE),
            Some(Variant::LocalizedText(LocalizedText::new("en", "Unacknowledged")))
        );
    }

    #[test]
    fn test_from_values_restores_snapshot() {
        let mut fields = failure_alarm();
        fields.event_id = vec![1, 2, 3, 4];
        fields.time = 1_760_000_000_000;
        fields.retain = true;
        fields.active = true;
        let restored = ConditionFields::from_values(&fields.field_values()).unwrap();
        assert_eq!(restored, fields);
    }

    #[test]
    fn test_from_values_missing_field() {
        let mut values = failure_alarm().field_values();
        values.retain(|(p, _)| *p != SEVERITY);
        assert!(matches!(
            ConditionFields::from_values(&values),
            Err(DiError::InvalidData(_))
        ));
    }
}
