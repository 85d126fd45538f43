use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Maintenance,
    Offline,
}

impl MachineStatus {
    pub const ALL: [MachineStatus; 3] = [
        MachineStatus::Online,
        MachineStatus::Maintenance,
        MachineStatus::Offline,
    ];

    /// Sampling weights used whenever a machine's status is (re)drawn.
    pub const WEIGHTS: [f64; 3] = [0.8, 0.15, 0.05];

    pub fn as_str(self) -> &'static str {
        match self {
            MachineStatus::Online => "online",
            MachineStatus::Maintenance => "maintenance",
            MachineStatus::Offline => "offline",
        }
    }

    /// Capitalized label for machine cards.
    pub fn label(self) -> &'static str {
        match self {
            MachineStatus::Online => "Online",
            MachineStatus::Maintenance => "Maintenance",
            MachineStatus::Offline => "Offline",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Superconducting,
    Simulator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Machine {
    pub name: String,
    pub location: String,
    pub qubit_count: u32,
    pub kind: MachineKind,
    pub status: MachineStatus,
    pub pending: u32,
    pub fidelity: f64,
    pub uptime: f64,
    pub last_update: DateTime<Utc>,
}

/// Static attributes of one roster entry.
#[derive(Debug, Clone, Copy)]
pub struct MachineProfile {
    pub name: &'static str,
    pub location: &'static str,
    pub qubit_count: u32,
    pub kind: MachineKind,
}

pub const MACHINE_ROSTER: [MachineProfile; 8] = [
    MachineProfile {
        name: "ibm_brisbane",
        location: "IBM Quantum Network",
        qubit_count: 127,
        kind: MachineKind::Superconducting,
    },
    MachineProfile {
        name: "ibm_kyoto",
        location: "IBM Quantum Network",
        qubit_count: 127,
        kind: MachineKind::Superconducting,
    },
    MachineProfile {
        name: "ibm_osaka",
        location: "IBM Quantum Network",
        qubit_count: 127,
        kind: MachineKind::Superconducting,
    },
    MachineProfile {
        name: "ibm_sherbrooke",
        location: "IBM Quantum Network",
        qubit_count: 127,
        kind: MachineKind::Superconducting,
    },
    MachineProfile {
        name: "ibm_torino",
        location: "IBM Quantum Network",
        qubit_count: 133,
        kind: MachineKind::Superconducting,
    },
    MachineProfile {
        name: "ibm_quebec",
        location: "IBM Quantum Network",
        qubit_count: 27,
        kind: MachineKind::Superconducting,
    },
    MachineProfile {
        name: "ibmq_qasm_simulator",
        location: "Cloud Simulator",
        qubit_count: 32,
        kind: MachineKind::Simulator,
    },
    MachineProfile {
        name: "simulator_mps",
        location: "Cloud Simulator",
        qubit_count: 100,
        kind: MachineKind::Simulator,
    },
];
