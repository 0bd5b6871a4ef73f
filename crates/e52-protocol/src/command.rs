//! Commands that can be sent to the E52 module.
//!
//! The wire format is `PREFIX NAME`, `PREFIX NAME=?` for queries, or
//! `PREFIX NAME=p1,p2` for parameterized commands, where `PREFIX` is `AT+`
//! for the locally attached module or `++AT+` when addressing a remote module
//! through the mesh. Parameters are rendered as decimal values joined by
//! commas. The module expects the bare command string with **no** line
//! terminator.

/// Command prefix for the locally attached module.
pub const LOCAL_PREFIX: &str = "AT+";

/// Command prefix for remote configuration through the mesh.
pub const REMOTE_PREFIX: &str = "++AT+";

/// Acknowledgment token present in every successful set/action response.
pub const ACK_TOKEN: &str = "OK";

/// Confirmation token printed after a user-data send is delivered.
pub const SEND_SUCCESS_TOKEN: &str = "SUCCESS";

/// UART parity setting (`AT+UART`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartParity {
    /// 8 data bits, no parity.
    None,
    /// 8 data bits, even parity.
    Even,
    /// 8 data bits, odd parity.
    Odd,
}

impl UartParity {
    /// Decimal code used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            UartParity::None => 0,
            UartParity::Even => 1,
            UartParity::Odd => 2,
        }
    }
}

/// Air data rate (`AT+RATE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirRate {
    /// 62.5 kbps.
    K62_5,
    /// 21.825 kbps.
    K21_825,
    /// 7 kbps.
    K7,
}

impl AirRate {
    /// Decimal code used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            AirRate::K62_5 => 0,
            AirRate::K21_825 => 1,
            AirRate::K7 => 2,
        }
    }
}

/// Communication method (`AT+OPTION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Point-to-point delivery to the target address.
    Unicast,
    /// Delivery to a multicast group.
    Multicast,
    /// Delivery to every node in range.
    Broadcast,
    /// Delivery to the nearest matching node.
    Anycast,
}

impl DeliveryMode {
    /// Decimal code used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            DeliveryMode::Unicast => 1,
            DeliveryMode::Multicast => 2,
            DeliveryMode::Broadcast => 3,
            DeliveryMode::Anycast => 4,
        }
    }
}

/// Node type (`AT+TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Routing node: forwards traffic for the mesh.
    Router,
    /// Terminal node: endpoint only.
    Terminal,
}

impl NodeRole {
    /// Decimal code used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            NodeRole::Router => 0,
            NodeRole::Terminal => 1,
        }
    }
}

fn flag(value: bool) -> String {
    if value { "1".to_string() } else { "0".to_string() }
}

/// Parameter shape of a command.
enum CommandParams {
    /// Bare command, e.g. `AT+RESET`.
    None,
    /// Query form, e.g. `AT+CHANNEL=?`.
    Query,
    /// Parameterized form, e.g. `AT+CHANNEL=13,1`.
    List(Vec<String>),
}

/// Commands understood by the E52 module.
///
/// `save` flags write the new value to flash so it survives a reset.
#[derive(Debug, Clone, PartialEq)]
pub enum AtCommand {
    // ========== Action Commands ==========
    /// Restart the module.
    Reset,

    /// Restore factory settings.
    FactoryDefaults,

    /// Enter IAP firmware upgrade mode.
    Iap,

    // ========== Info Queries ==========
    /// Query the main module parameters.
    GetInfo,

    /// Query the module model.
    GetDeviceType,

    /// Query the firmware code.
    GetFirmwareCode,

    /// Query the MAC address.
    GetMac,

    // ========== Radio ==========
    /// Query the RF output power.
    GetPower,

    /// Set the RF output power in dBm (-9 to +22).
    SetPower {
        /// Output power in dBm.
        dbm: i8,
        /// Persist to flash.
        save: bool,
    },

    /// Query the working channel.
    GetChannel,

    /// Set the working channel.
    SetChannel {
        /// Channel number.
        channel: u8,
        /// Persist to flash.
        save: bool,
    },

    /// Query the air data rate.
    GetRate,

    /// Set the air data rate.
    SetRate {
        /// Rate code.
        rate: AirRate,
    },

    // ========== UART ==========
    /// Query the UART parameters.
    GetUart,

    /// Set the UART parameters.
    SetUart {
        /// Baud rate.
        baud: u32,
        /// Parity setting.
        parity: UartParity,
    },

    // ========== Addressing ==========
    /// Query the communication method.
    GetOption,

    /// Set the communication method.
    SetOption {
        /// Delivery mode.
        mode: DeliveryMode,
        /// Persist to flash.
        save: bool,
    },

    /// Query the network ID.
    GetPanId,

    /// Set the network ID.
    SetPanId {
        /// Network identification code.
        pan_id: u16,
        /// Persist to flash.
        save: bool,
    },

    /// Query the node type.
    GetNodeType,

    /// Set the node type.
    SetNodeType {
        /// Routing or terminal node.
        role: NodeRole,
    },

    /// Query the local address.
    GetSrcAddr,

    /// Set the local address.
    SetSrcAddr {
        /// Address (0 to 65535).
        addr: u16,
        /// Persist to flash.
        save: bool,
    },

    /// Query the target address.
    GetDstAddr,

    /// Set the target address.
    SetDstAddr {
        /// Address (0 to 65535).
        addr: u16,
        /// Persist to flash.
        save: bool,
    },

    /// Query the local port.
    GetSrcPort,

    /// Set the local port.
    SetSrcPort {
        /// Port number.
        port: u8,
        /// Persist to flash.
        save: bool,
    },

    /// Query the target port.
    GetDstPort,

    /// Set the target port (1 for normal data, 14 for remote configuration).
    SetDstPort {
        /// Port number.
        port: u8,
        /// Persist to flash.
        save: bool,
    },

    // ========== Mesh Tuning ==========
    /// Query the multicast member radius.
    GetMemberRadius,

    /// Set the multicast member radius (0 to 15).
    SetMemberRadius {
        /// Radius in hops.
        radius: u8,
        /// Persist to flash.
        save: bool,
    },

    /// Query the multicast non-member radius.
    GetNonMemberRadius,

    /// Set the multicast non-member radius (0 to 15).
    SetNonMemberRadius {
        /// Radius in hops.
        radius: u8,
        /// Persist to flash.
        save: bool,
    },

    /// Query the CSMA random avoidance time.
    GetCsmaRange,

    /// Set the CSMA random avoidance time in ms (20 to 65535).
    SetCsmaRange {
        /// Avoidance window in milliseconds.
        millis: u16,
    },

    /// Query the maximum number of consecutive route failures.
    GetRouterScore,

    /// Set the maximum number of consecutive route failures (1 to 15).
    SetRouterScore {
        /// Failure count.
        score: u8,
    },

    /// Query the extra frame header function.
    GetHead,

    /// Enable or disable the extra frame header function.
    SetHead {
        /// Enabled state.
        enabled: bool,
    },

    /// Query the return message function.
    GetBack,

    /// Enable or disable the return message function.
    SetBack {
        /// Enabled state.
        enabled: bool,
    },

    // ========== Timers ==========
    /// Query the auto-reset LED2 function.
    GetResetAux,

    /// Enable or disable auto-reset LED2 change.
    SetResetAux {
        /// Enabled state.
        enabled: bool,
    },

    /// Query the automatic reset time.
    GetResetTime,

    /// Set the automatic reset time in minutes (0 disables auto-reset).
    SetResetTime {
        /// Minutes (0 to 255).
        minutes: u8,
    },

    /// Query the broadcast filter timeout.
    GetFilterTime,

    /// Set the broadcast filter timeout in ms (3000 to 65535).
    SetFilterTime {
        /// Timeout in milliseconds.
        millis: u16,
    },

    /// Query the request response timeout.
    GetAckTime,

    /// Set the request response timeout in ms (1000 to 65535).
    SetAckTime {
        /// Timeout in milliseconds.
        millis: u16,
    },

    /// Query the routing request timeout.
    GetRouterTime,

    /// Set the routing request timeout in ms (1000 to 65535).
    SetRouterTime {
        /// Timeout in milliseconds.
        millis: u16,
    },

    // ========== Groups & Routing Tables ==========
    /// Add a multicast group.
    GroupAdd {
        /// Group address (0 to 65535).
        group: u16,
    },

    /// Delete a multicast group.
    GroupDelete {
        /// Group address (0 to 65535).
        group: u16,
    },

    /// Clear the multicast group table.
    GroupClear,

    /// Clear the routing table in RAM.
    RouterClear,

    /// Save or delete the routing table in flash.
    RouterSave {
        /// `true` saves the table, `false` deletes it.
        keep: bool,
    },

    /// Load the routing table from flash.
    RouterLoad,

    // ========== Security ==========
    /// Query the encryption function.
    GetSecurity,

    /// Enable or disable the encryption function.
    SetSecurity {
        /// Enabled state.
        enabled: bool,
    },

    /// Query the encryption key.
    GetKey,

    /// Set the data encryption key (0 to 0x7FFFFFFF).
    SetKey {
        /// Encryption key.
        key: u32,
    },

    // ========== Raw Command ==========
    /// Send a command the catalog does not know.
    Raw {
        /// Command name without the prefix.
        name: String,
        /// Decimal-rendered parameters; empty means a bare command.
        params: Vec<String>,
        /// Encode as a query (`=?`); ignored when `params` is non-empty.
        query: bool,
    },
}

impl AtCommand {
    /// Encode the command for transmission.
    ///
    /// Returns the bytes to send. The module dialect uses no terminator.
    pub fn encode(&self, remote: bool) -> Vec<u8> {
        self.to_command_string(remote).into_bytes()
    }

    /// Get the full command string including the prefix.
    pub fn to_command_string(&self, remote: bool) -> String {
        let prefix = if remote { REMOTE_PREFIX } else { LOCAL_PREFIX };
        let (name, params) = self.parts();
        match params {
            CommandParams::None => format!("{}{}", prefix, name),
            CommandParams::Query => format!("{}{}=?", prefix, name),
            CommandParams::List(values) => {
                format!("{}{}={}", prefix, name, values.join(","))
            }
        }
    }

    /// Whether this is a query command (no expected acknowledgment).
    pub fn is_query(&self) -> bool {
        matches!(self.parts().1, CommandParams::Query)
    }

    /// Substring that must appear in the response for the command to have
    /// succeeded. Queries have no expectation; their result is whatever the
    /// module reports.
    pub fn expectation(&self) -> Option<&'static str> {
        if self.is_query() {
            None
        } else {
            Some(ACK_TOKEN)
        }
    }

    fn parts(&self) -> (&str, CommandParams) {
        use CommandParams::{List, None, Query};

        match self {
            AtCommand::Reset => ("RESET", None),
            AtCommand::FactoryDefaults => ("DEFAULT", None),
            AtCommand::Iap => ("IAP", None),

            AtCommand::GetInfo => ("INFO", Query),
            AtCommand::GetDeviceType => ("DEVTYPE", Query),
            AtCommand::GetFirmwareCode => ("FWCODE", Query),
            AtCommand::GetMac => ("MAC", Query),

            AtCommand::GetPower => ("POWER", Query),
            AtCommand::SetPower { dbm, save } => {
                ("POWER", List(vec![dbm.to_string(), flag(*save)]))
            }
            AtCommand::GetChannel => ("CHANNEL", Query),
            AtCommand::SetChannel { channel, save } => {
                ("CHANNEL", List(vec![channel.to_string(), flag(*save)]))
            }
            AtCommand::GetRate => ("RATE", Query),
            AtCommand::SetRate { rate } => ("RATE", List(vec![rate.code().to_string()])),

            AtCommand::GetUart => ("UART", Query),
            AtCommand::SetUart { baud, parity } => {
                ("UART", List(vec![baud.to_string(), parity.code().to_string()]))
            }

            AtCommand::GetOption => ("OPTION", Query),
            AtCommand::SetOption { mode, save } => {
                ("OPTION", List(vec![mode.code().to_string(), flag(*save)]))
            }
            AtCommand::GetPanId => ("PANID", Query),
            AtCommand::SetPanId { pan_id, save } => {
                ("PANID", List(vec![pan_id.to_string(), flag(*save)]))
            }
            AtCommand::GetNodeType => ("TYPE", Query),
            AtCommand::SetNodeType { role } => ("TYPE", List(vec![role.code().to_string()])),

            AtCommand::GetSrcAddr => ("SRC_ADDR", Query),
            AtCommand::SetSrcAddr { addr, save } => {
                ("SRC_ADDR", List(vec![addr.to_string(), flag(*save)]))
            }
            AtCommand::GetDstAddr => ("DST_ADDR", Query),
            AtCommand::SetDstAddr { addr, save } => {
                ("DST_ADDR", List(vec![addr.to_string(), flag(*save)]))
            }
            AtCommand::GetSrcPort => ("SRC_PORT", Query),
            AtCommand::SetSrcPort { port, save } => {
                ("SRC_PORT", List(vec![port.to_string(), flag(*save)]))
            }
            AtCommand::GetDstPort => ("DST_PORT", Query),
            AtCommand::SetDstPort { port, save } => {
                ("DST_PORT", List(vec![port.to_string(), flag(*save)]))
            }

            AtCommand::GetMemberRadius => ("MEMBER_RAD", Query),
            AtCommand::SetMemberRadius { radius, save } => {
                ("MEMBER_RAD", List(vec![radius.to_string(), flag(*save)]))
            }
            AtCommand::GetNonMemberRadius => ("NONMEMBER_RAD", Query),
            AtCommand::SetNonMemberRadius { radius, save } => {
                ("NONMEMBER_RAD", List(vec![radius.to_string(), flag(*save)]))
            }
            AtCommand::GetCsmaRange => ("CSMA_RNG", Query),
            AtCommand::SetCsmaRange { millis } => {
                ("CSMA_RNG", List(vec![millis.to_string()]))
            }
            AtCommand::GetRouterScore => ("ROUTER_SCORE", Query),
            AtCommand::SetRouterScore { score } => {
                ("ROUTER_SCORE", List(vec![score.to_string()]))
            }
            AtCommand::GetHead => ("HEAD", Query),
            AtCommand::SetHead { enabled } => ("HEAD", List(vec![flag(*enabled)])),
            AtCommand::GetBack => ("BACK", Query),
            AtCommand::SetBack { enabled } => ("BACK", List(vec![flag(*enabled)])),

            AtCommand::GetResetAux => ("RESET_AUX", Query),
            AtCommand::SetResetAux { enabled } => ("RESET_AUX", List(vec![flag(*enabled)])),
            AtCommand::GetResetTime => ("RESET_TIME", Query),
            AtCommand::SetResetTime { minutes } => {
                ("RESET_TIME", List(vec![minutes.to_string()]))
            }
            AtCommand::GetFilterTime => ("FILTER_TIME", Query),
            AtCommand::SetFilterTime { millis } => {
                ("FILTER_TIME", List(vec![millis.to_string()]))
            }
            AtCommand::GetAckTime => ("ACK_TIME", Query),
            AtCommand::SetAckTime { millis } => ("ACK_TIME", List(vec![millis.to_string()])),
            AtCommand::GetRouterTime => ("ROUTER_TIME", Query),
            AtCommand::SetRouterTime { millis } => {
                ("ROUTER_TIME", List(vec![millis.to_string()]))
            }

            AtCommand::GroupAdd { group } => ("GROUP_ADD", List(vec![group.to_string()])),
            AtCommand::GroupDelete { group } => ("GROUP_DEL", List(vec![group.to_string()])),
            AtCommand::GroupClear => ("GROUP_CLR", List(vec!["1".to_string()])),
            AtCommand::RouterClear => ("ROUTER_CLR", List(vec!["1".to_string()])),
            AtCommand::RouterSave { keep } => ("ROUTER_SAVE", List(vec![flag(*keep)])),
            AtCommand::RouterLoad => ("ROUTER_READ", List(vec!["1".to_string()])),

            AtCommand::GetSecurity => ("SECURITY", Query),
            AtCommand::SetSecurity { enabled } => ("SECURITY", List(vec![flag(*enabled)])),
            AtCommand::GetKey => ("KEY", Query),
            AtCommand::SetKey { key } => ("KEY", List(vec![key.to_string()])),

            AtCommand::Raw { name, params, query } => {
                if !params.is_empty() {
                    (name.as_str(), List(params.clone()))
                } else if *query {
                    (name.as_str(), Query)
                } else {
                    (name.as_str(), None)
                }
            }
        }
    }
}
