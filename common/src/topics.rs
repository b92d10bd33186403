pub const TOPIC_CMD_SET_OVERRIDE: &str = "evohome/cmnd/set_zone_override";
pub const TOPIC_CMD_CLEAR_OVERRIDE: &str = "evohome/cmnd/clear_zone_override";
pub const TOPIC_CMD_SET_HVAC_MODE: &str = "climate/cmnd/set_hvac_mode";

pub const COMMAND_TOPICS: [&str; 3] = [
    TOPIC_CMD_SET_OVERRIDE,
    TOPIC_CMD_CLEAR_OVERRIDE,
    TOPIC_CMD_SET_HVAC_MODE,
];

/// Retained zone snapshots. An empty payload means the entity is gone.
pub fn zone_state_topic(entity: &str) -> String {
    format!("evohome/zone/{entity}/state")
}

pub fn card_view_topic(entity: &str) -> String {
    format!("evohome/card/{entity}/view")
}
