//! Command prototypes: name, argument encodings and constraints.

use crate::config::params::Encoding;

/// One declared argument of a command.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub encoding: Encoding,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub permitted: &'static [u32],
}

const fn arg(name: &'static str, encoding: Encoding) -> ArgSpec {
    ArgSpec {
        name,
        encoding,
        min: None,
        max: None,
        permitted: &[],
    }
}

const fn ranged(name: &'static str, encoding: Encoding, min: f64, max: f64) -> ArgSpec {
    ArgSpec {
        name,
        encoding,
        min: Some(min),
        max: Some(max),
        permitted: &[],
    }
}

/// Recognised command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Parml,
    Parmr,
    Parmw,
    Profr,
    Profw,
    Paspw,
    Secur,
    Dumpm,
    Dumpd,
    Rstvw,
    Rstbw,
    Factw,
    Statr,
    Erase,
    Scalw,
    Scalr,
    Argostx,
}

#[derive(Debug)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub command: Command,
    pub args: &'static [ArgSpec],
}

pub const COMMAND_TABLE: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: "PARML",
        command: Command::Parml,
        args: &[],
    },
    CommandDescriptor {
        name: "PARMR",
        command: Command::Parmr,
        args: &[arg("keys", Encoding::KeyList)],
    },
    CommandDescriptor {
        name: "PARMW",
        command: Command::Parmw,
        args: &[arg("key_values", Encoding::KeyValueList)],
    },
    CommandDescriptor {
        name: "PROFR",
        command: Command::Profr,
        args: &[],
    },
    CommandDescriptor {
        name: "PROFW",
        command: Command::Profw,
        args: &[ranged("profile_name", Encoding::Text, 1.0, 128.0)],
    },
    CommandDescriptor {
        name: "PASPW",
        command: Command::Paspw,
        args: &[arg("prepass_file", Encoding::Base64)],
    },
    CommandDescriptor {
        name: "SECUR",
        command: Command::Secur,
        args: &[arg("accesscode", Encoding::Hexadecimal)],
    },
    CommandDescriptor {
        name: "DUMPM",
        command: Command::Dumpm,
        args: &[
            arg("start_address", Encoding::Hexadecimal),
            ranged("length", Encoding::Hexadecimal, 0.0, 0x500 as f64),
        ],
    },
    CommandDescriptor {
        name: "DUMPD",
        command: Command::Dumpd,
        args: &[ranged("d_type", Encoding::Hexadecimal, 0.0, 7.0)],
    },
    CommandDescriptor {
        name: "RSTVW",
        command: Command::Rstvw,
        args: &[ArgSpec {
            name: "index",
            encoding: Encoding::Hexadecimal,
            min: None,
            max: None,
            permitted: &[1, 3, 4],
        }],
    },
    CommandDescriptor {
        name: "RSTBW",
        command: Command::Rstbw,
        args: &[],
    },
    CommandDescriptor {
        name: "FACTW",
        command: Command::Factw,
        args: &[],
    },
    CommandDescriptor {
        name: "STATR",
        command: Command::Statr,
        args: &[arg("keys", Encoding::KeyList)],
    },
    CommandDescriptor {
        name: "ERASE",
        command: Command::Erase,
        args: &[ranged("log_type", Encoding::Uint, 1.0, 9.0)],
    },
    CommandDescriptor {
        name: "SCALW",
        command: Command::Scalw,
        args: &[
            ranged("sensor", Encoding::Uint, 0.0, 6.0),
            arg("offset", Encoding::Uint),
            arg("value", Encoding::Float),
        ],
    },
    CommandDescriptor {
        name: "SCALR",
        command: Command::Scalr,
        args: &[
            ranged("sensor", Encoding::Uint, 0.0, 6.0),
            arg("offset", Encoding::Uint),
        ],
    },
    CommandDescriptor {
        name: "ARGOSTX",
        command: Command::Argostx,
        args: &[
            ranged("modulation", Encoding::Uint, 0.0, 2.0),
            ranged("power_mw", Encoding::Uint, 0.0, 1500.0),
            arg("frequency", Encoding::Float),
            ranged("size_bytes", Encoding::Uint, 1.0, 31.0),
            ranged("tcxo_time", Encoding::Uint, 0.0, 60.0),
        ],
    },
];

pub fn find(name: &str) -> Option<&'static CommandDescriptor> {
    COMMAND_TABLE.iter().find(|c| c.name == name)
}
