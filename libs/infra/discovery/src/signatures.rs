// [libs/infra/discovery/src/signatures.rs]
/*!
 * =================================================================
 * APARATO: FIRMAS DE IDENTIFICACIÓN DE FABRICANTE (V1.0)
 * CLASIFICACIÓN: INFRA LAYER (ESTRATO L3)
 * =================================================================
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinerType {
    Antminer,
    Whatsminer,
    Avalon,
    Braiins,
    Vnish,
    Luxos,
    Unknown,
}

impl MinerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinerType::Antminer => "antminer",
            MinerType::Whatsminer => "whatsminer",
            MinerType::Avalon => "avalon",
            MinerType::Braiins => "braiins",
            MinerType::Vnish => "vnish",
            MinerType::Luxos => "luxos",
            MinerType::Unknown => "unknown",
        }
    }
}

pub struct MinerSignature {
    pub miner_type: MinerType,
    pub http_path: &'static str,
    pub http_contains: &'static [&'static str],
}

/// Firmas conocidas, en el mismo orden de precedencia que el original.
pub const MINER_SIGNATURES: &[MinerSignature] = &[
    MinerSignature {
        miner_type: MinerType::Antminer,
        http_path: "/cgi-bin/get_system_info.cgi",
        http_contains: &["Antminer", "ANTMINER"],
    },
    MinerSignature {
        miner_type: MinerType::Whatsminer,
        http_path: "/api/v1/status",
        http_contains: &["Whatsminer", "MicroBT"],
    },
    MinerSignature {
        miner_type: MinerType::Braiins,
        http_path: "/cgi-bin/luci",
        http_contains: &["Braiins", "BOSminer"],
    },
    MinerSignature {
        miner_type: MinerType::Vnish,
        http_path: "/api/info",
        http_contains: &["vnish", "Vnish"],
    },
    MinerSignature {
        miner_type: MinerType::Luxos,
        http_path: "/api/status",
        http_contains: &["LuxOS", "Luxor"],
    },
];

pub const HTTP_PORTS: &[u16] = &[80, 443, 8080];

/// Identifica el fabricante a partir de una cadena libre (campo `Type`/`Miner`
/// del protocolo CGMiner), por coincidencia de subcadenas, igual que el original.
pub fn identify_type_from_string(type_string: &str) -> MinerType {
    if type_string.is_empty() {
        return MinerType::Unknown;
    }
    let lowered = type_string.to_lowercase();

    if ["antminer", "bmminer", "s19", "s21", "t19", "t21"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        return MinerType::Antminer;
    }
    if ["whatsminer", "btminer", "m30", "m50", "m60"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        return MinerType::Whatsminer;
    }
    if ["avalon", "canaan"].iter().any(|needle| lowered.contains(needle)) {
        return MinerType::Avalon;
    }
    if ["braiins", "bosminer", "bos"].iter().any(|needle| lowered.contains(needle)) {
        return MinerType::Braiins;
    }
    if lowered.contains("vnish") {
        return MinerType::Vnish;
    }
    if ["luxos", "luxor"].iter().any(|needle| lowered.contains(needle)) {
        return MinerType::Luxos;
    }

    MinerType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_antminer_by_model_substring() {
        assert_eq!(identify_type_from_string("Antminer S19 Pro"), MinerType::Antminer);
    }

    #[test]
    fn identifies_whatsminer_by_btminer_alias() {
        assert_eq!(identify_type_from_string("btminer-v3"), MinerType::Whatsminer);
    }

    #[test]
    fn falls_back_to_unknown() {
        assert_eq!(identify_type_from_string("some other rig"), MinerType::Unknown);
    }
}
