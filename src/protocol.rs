//! Wire protocol for minibot robots
//!
//! All robot traffic is UDP. Movement commands use a fixed 24-byte binary
//! frame; everything else (match status, emergency stop, discovery pings)
//! is plain UTF-8 text.
//!
//! # Movement Packet Layout
//!
//! ```text
//! ┌────────┬──────┬─────────────────────────────────────────────┐
//! │ Offset │ Size │ Meaning                                     │
//! ├────────┼──────┼─────────────────────────────────────────────┤
//! │ 0-15   │ 16B  │ robot name, UTF-8, zero-padded/truncated    │
//! │ 16     │ 1B   │ left stick X  (0-255)                       │
//! │ 17     │ 1B   │ left stick Y                                │
//! │ 18     │ 1B   │ right stick X                               │
//! │ 19     │ 1B   │ right stick Y                               │
//! │ 20-21  │ 2B   │ unused axes, fixed filler 125               │
//! │ 22     │ 1B   │ buttons: bit0 cross, bit1 circle,           │
//! │        │      │          bit2 square, bit3 triangle         │
//! │ 23     │ 1B   │ reserved, always 0                          │
//! └────────┴──────┴─────────────────────────────────────────────┘
//! ```
//!
//! # Text Messages
//!
//! | Direction | Port      | Format                     |
//! |-----------|-----------|----------------------------|
//! | outbound  | command   | `<name>:teleop`            |
//! | outbound  | command   | `<name>:standby`           |
//! | broadcast | discovery | `ESTOP` / `ESTOP_OFF`      |
//! | inbound   | discovery | `DISCOVER:<robotId>:<ip>`  |
//!
//! Malformed inbound text is not an error; the caller drops it. The robot
//! re-pings on its own cadence, so nothing here retries.

/// Total size of a movement command frame
pub const MOVEMENT_PACKET_LEN: usize = 24;

/// Width of the name field at the start of the frame
const NAME_FIELD_LEN: usize = 16;

/// Filler value the firmware expects on the two unused axis bytes
const UNUSED_AXIS_FILLER: u8 = 125;

/// Axis deviation from center below which a command counts as "no movement"
const MOVEMENT_THRESHOLD: u8 = 5;

/// Firmware center value for an axis byte
const AXIS_CENTER: u8 = 127;

const BUTTON_CROSS: u8 = 0x01;
const BUTTON_CIRCLE: u8 = 0x02;
const BUTTON_SQUARE: u8 = 0x04;
const BUTTON_TRIANGLE: u8 = 0x08;

/// Fleet-wide match phase
///
/// Gates the command gateway: movement only reaches robots during
/// [`MatchPhase::Teleop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPhase {
    #[default]
    Standby,
    Teleop,
}

impl MatchPhase {
    /// Status keyword as it appears on the wire
    pub fn status_str(&self) -> &'static str {
        match self {
            MatchPhase::Standby => "standby",
            MatchPhase::Teleop => "teleop",
        }
    }
}

/// A movement command addressed to one robot
///
/// Ephemeral value built per send, never stored. Axis values are already
/// in firmware units (0-255, 127-128 center); use [`MovementCommand::from_normalized`]
/// to convert controller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementCommand {
    pub robot_name: String,
    pub left_x: u8,
    pub left_y: u8,
    pub right_x: u8,
    pub right_y: u8,
    pub cross: bool,
    pub circle: bool,
    pub square: bool,
    pub triangle: bool,
}

impl MovementCommand {
    /// Build a command from normalized stick input in [-1.0, 1.0]
    pub fn from_normalized(robot_name: &str, left_x: f32, left_y: f32, right_x: f32, right_y: f32) -> Self {
        Self {
            robot_name: robot_name.to_string(),
            left_x: stick_to_byte(left_x),
            left_y: stick_to_byte(left_y),
            right_x: stick_to_byte(right_x),
            right_y: stick_to_byte(right_y),
            cross: false,
            circle: false,
            square: false,
            triangle: false,
        }
    }

    /// The canonical stop command: centered sticks, no buttons
    ///
    /// Identical on the wire to a movement command with all sticks at rest,
    /// so a receiver cannot distinguish "blocked by interlock" from
    /// "operator holding center".
    pub fn stop(robot_name: &str) -> Self {
        Self::from_normalized(robot_name, 0.0, 0.0, 0.0, 0.0)
    }

    /// Set button states
    pub fn with_buttons(mut self, cross: bool, circle: bool, square: bool, triangle: bool) -> Self {
        self.cross = cross;
        self.circle = circle;
        self.square = square;
        self.triangle = triangle;
        self
    }

    /// True when any axis deviates from center by more than the deadband
    pub fn has_movement(&self) -> bool {
        let deviates = |v: u8| v.abs_diff(AXIS_CENTER) > MOVEMENT_THRESHOLD;
        deviates(self.left_x) || deviates(self.left_y) || deviates(self.right_x) || deviates(self.right_y)
    }
}

/// Convert a normalized stick value in [-1.0, 1.0] to a firmware axis byte
///
/// `round((v + 1.0) * 127.5)`, clamped to [0, 255]. Lossy by design;
/// center (0.0) maps to 128.
pub fn stick_to_byte(v: f32) -> u8 {
    ((v + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8
}

/// Encode a movement command into the 24-byte frame
///
/// Names longer than 16 bytes are silently truncated; keep robot ids
/// within 16 bytes for round-trip fidelity.
pub fn encode_movement(command: &MovementCommand) -> [u8; MOVEMENT_PACKET_LEN] {
    let mut packet = [0u8; MOVEMENT_PACKET_LEN];

    let name_bytes = command.robot_name.as_bytes();
    let name_len = name_bytes.len().min(NAME_FIELD_LEN);
    packet[..name_len].copy_from_slice(&name_bytes[..name_len]);

    packet[16] = command.left_x;
    packet[17] = command.left_y;
    packet[18] = command.right_x;
    packet[19] = command.right_y;
    packet[20] = UNUSED_AXIS_FILLER;
    packet[21] = UNUSED_AXIS_FILLER;

    let mut buttons = 0u8;
    if command.cross {
        buttons |= BUTTON_CROSS;
    }
    if command.circle {
        buttons |= BUTTON_CIRCLE;
    }
    if command.square {
        buttons |= BUTTON_SQUARE;
    }
    if command.triangle {
        buttons |= BUTTON_TRIANGLE;
    }
    packet[22] = buttons;
    packet[23] = 0;

    packet
}

/// Decode a 24-byte frame back into a movement command
///
/// Inverse of [`encode_movement`] for the fields the frame defines.
/// Used by tests and diagnostic tooling; the daemon itself only encodes.
pub fn decode_movement(packet: &[u8; MOVEMENT_PACKET_LEN]) -> MovementCommand {
    let name_end = packet[..NAME_FIELD_LEN]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(NAME_FIELD_LEN);
    let robot_name = String::from_utf8_lossy(&packet[..name_end]).into_owned();

    MovementCommand {
        robot_name,
        left_x: packet[16],
        left_y: packet[17],
        right_x: packet[18],
        right_y: packet[19],
        cross: packet[22] & BUTTON_CROSS != 0,
        circle: packet[22] & BUTTON_CIRCLE != 0,
        square: packet[22] & BUTTON_SQUARE != 0,
        triangle: packet[22] & BUTTON_TRIANGLE != 0,
    }
}

/// Encode a match status message: `"<name>:teleop"` / `"<name>:standby"`
pub fn encode_game_status(robot_name: &str, phase: MatchPhase) -> String {
    format!("{}:{}", robot_name, phase.status_str())
}

/// Encode the fleet-wide emergency stop broadcast
pub fn encode_estop(active: bool) -> &'static str {
    if active {
        "ESTOP"
    } else {
        "ESTOP_OFF"
    }
}

/// Parse a discovery ping: `"DISCOVER:<robotId>:<ip>"`
///
/// Returns `None` for anything else; malformed lines are dropped, not
/// reported.
pub fn parse_discovery(message: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = message.trim().split(':').collect();
    if parts.len() < 3 || parts[0] != "DISCOVER" {
        return None;
    }
    Some((parts[1].to_string(), parts[2].to_string()))
}
