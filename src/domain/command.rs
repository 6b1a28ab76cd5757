use serde::{Deserialize, Serialize};
use std::fmt;

/// Commands the optimizer can send to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleCommand {
    StartCharge,
    StopCharge,
    SetChargingAmps(u32),
    OpenChargePort,
}

impl VehicleCommand {
    /// Command name on the vehicle API.
    pub fn wire_name(&self) -> &'static str {
        match self {
            VehicleCommand::StartCharge => "START_CHARGE",
            VehicleCommand::StopCharge => "STOP_CHARGE",
            VehicleCommand::SetChargingAmps(_) => "CHARGING_AMPS",
            VehicleCommand::OpenChargePort => "CHARGE_PORT_DOOR_OPEN",
        }
    }

    /// JSON parameters sent with the command.
    pub fn params(&self) -> serde_json::Value {
        match self {
            VehicleCommand::SetChargingAmps(amps) => serde_json::json!({ "charging_amps": amps }),
            _ => serde_json::json!({}),
        }
    }
}

impl fmt::Display for VehicleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleCommand::SetChargingAmps(amps) => write!(f, "Setting CHARGING AMPS to {amps}"),
            other => f.write_str(other.wire_name()),
        }
    }
}

/// Result reported by the gateway for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub message: String,
    pub success: bool,
}

impl CommandOutcome {
    pub fn accepted() -> Self {
        Self {
            message: "Command Success".to_string(),
            success: true,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_params() {
        assert_eq!(
            VehicleCommand::SetChargingAmps(7).params(),
            serde_json::json!({ "charging_amps": 7 })
        );
        assert_eq!(VehicleCommand::StopCharge.params(), serde_json::json!({}));
    }

    #[test]
    fn test_display() {
        assert_eq!(VehicleCommand::StartCharge.to_string(), "START_CHARGE");
        assert_eq!(
            VehicleCommand::SetChargingAmps(6).to_string(),
            "Setting CHARGING AMPS to 6"
        );
    }
}
