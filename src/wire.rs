//! JSON documents consumed by the simulator.
//!
//! Three document kinds are produced per run:
//!
//! - [`PeDocument`] (`PE<address>.json`): processing-element parameters
//! - [`InjectorDocument`] (`INJ<address>.json`): traffic-injector parameters
//! - [`PlatformDocument`] (`PlatformConfig.json`): platform summary
//!
//! Field names are part of the simulator contract and are spelled exactly
//! as it expects. Documents are rendered with keys sorted and a four-space
//! indent ([`to_pretty_json`]) so that runs diff cleanly.
//!
//! Unallocated endpoints and idle injectors carry the simulator's sentinel
//! value [`SENTINEL`] in their id and target fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::derive::{Binding, EndpointRecord, InjectorRecord, TargetList, DEFAULT_PAYLOAD_SIZE};
use crate::error::FlowResult;
use crate::platform::Platform;
use crate::types::{Address, AppId, CellIndex, ThreadId};

/// Placeholder written for ids and targets that do not exist.
pub const SENTINEL: u32 = 99;

pub const COMM_STRUCTURE: &str = "NOC";
pub const INJECTOR_TYPE: &str = "FXD";
pub const FLOW_TYPE: &str = "RND";
pub const BUFFER_SIZE: u32 = 128;
pub const PROCESSING_TIME: u32 = 1;
pub const SOURCE_PAYLOAD_SIZE: u32 = 32;
pub const HEADER_SIZE: u32 = 2;
pub const TIMESTAMP_FLAG: u32 = 1_984_626_850;
pub const MESSAGES_SENT_FLAG: u32 = 2_101_596_287;

const HEADER_FLITS: [&str; 2] = ["ADDR", "SIZE"];
const PAYLOAD_PREFIX: [&str; 6] = ["PEPOS", "TMSTP", "RANDO", "RANDO", "RANDO", "RANDO"];
const PAYLOAD_FILLER: &str = "RANDO";

/// A burst amount: written as an integer when integral, else as a float.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurstAmount(pub f64);

impl Serialize for BurstAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
            serializer.serialize_i64(v as i64)
        } else {
            serializer.serialize_f64(v)
        }
    }
}

impl<'de> Deserialize<'de> for BurstAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(BurstAmount)
    }
}

fn wire_ids(binding: Binding) -> (AppId, ThreadId) {
    match binding {
        Binding::Bound(t) => (t.app, t.thread),
        Binding::Unallocated => (SENTINEL, SENTINEL),
    }
}

/// `PE<address>.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeDocument {
    #[serde(rename = "AppID")]
    pub app_id: AppId,
    #[serde(rename = "AverageProcessingTimeInClockPulses")]
    pub average_processing_time: u32,
    #[serde(rename = "CommStructure")]
    pub comm_structure: String,
    #[serde(rename = "InBufferSize")]
    pub in_buffer_size: u32,
    #[serde(rename = "InjectorClockPeriod")]
    pub injector_clock_period: u32,
    #[serde(rename = "InjectorType")]
    pub injector_type: String,
    #[serde(rename = "OutBufferSize")]
    pub out_buffer_size: u32,
    #[serde(rename = "PEPos")]
    pub pe_pos: Address,
    #[serde(rename = "ThreadID")]
    pub thread_id: ThreadId,
}

impl From<&EndpointRecord> for PeDocument {
    fn from(record: &EndpointRecord) -> Self {
        let (app_id, thread_id) = wire_ids(record.binding);
        Self {
            app_id,
            average_processing_time: PROCESSING_TIME,
            comm_structure: COMM_STRUCTURE.to_string(),
            in_buffer_size: BUFFER_SIZE,
            injector_clock_period: record.clock_period,
            injector_type: INJECTOR_TYPE.to_string(),
            out_buffer_size: BUFFER_SIZE,
            pe_pos: record.address,
            thread_id,
        }
    }
}

/// `INJ<address>.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InjectorDocument {
    #[serde(rename = "AmountOfMessagesInBurst")]
    pub amount_of_messages_in_burst: Vec<BurstAmount>,
    #[serde(rename = "AmountOfSourcePEs")]
    pub amount_of_source_pes: usize,
    #[serde(rename = "AmountOfTargetPEs")]
    pub amount_of_target_pes: usize,
    #[serde(rename = "AppID")]
    pub app_id: AppId,
    #[serde(rename = "AverageProcessingTimeInClockPulses")]
    pub average_processing_time: u32,
    #[serde(rename = "FlowType")]
    pub flow_type: String,
    #[serde(rename = "HeaderSize")]
    pub header_size: u32,
    #[serde(rename = "Headers")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(rename = "InjectionRate")]
    pub injection_rate: u8,
    #[serde(rename = "InjectorType")]
    pub injector_type: String,
    #[serde(rename = "PEPos")]
    pub pe_pos: Address,
    #[serde(rename = "Payloads")]
    pub payloads: BTreeMap<String, Vec<String>>,
    #[serde(rename = "RNGSeed1")]
    pub rng_seed1: u32,
    #[serde(rename = "RNGSeed2")]
    pub rng_seed2: u32,
    #[serde(rename = "SourcePEs")]
    pub source_pes: Vec<Address>,
    #[serde(rename = "SourcePayloadSize")]
    pub source_payload_size: u32,
    #[serde(rename = "TargetPEs")]
    pub target_pes: Vec<Address>,
    #[serde(rename = "TargetPayloadSize")]
    pub target_payload_size: Vec<usize>,
    #[serde(rename = "ThreadID")]
    pub thread_id: ThreadId,
    #[serde(rename = "amountOfMessagesSentFlag")]
    pub amount_of_messages_sent_flag: u32,
    #[serde(rename = "timestampFlag")]
    pub timestamp_flag: u32,
}

/// Payload template of `size` flits: a fixed prefix padded with filler.
pub fn payload_template(size: usize) -> Vec<String> {
    PAYLOAD_PREFIX
        .iter()
        .copied()
        .chain(std::iter::repeat(PAYLOAD_FILLER))
        .take(size.max(PAYLOAD_PREFIX.len()))
        .map(str::to_string)
        .collect()
}

impl From<&InjectorRecord> for InjectorDocument {
    fn from(record: &InjectorRecord) -> Self {
        let (app_id, thread_id) = wire_ids(record.binding);

        let (target_pes, bursts, payload_sizes): (Vec<Address>, Vec<BurstAmount>, Vec<usize>) =
            match &record.targets {
                TargetList::Idle => (
                    vec![SENTINEL as Address],
                    vec![BurstAmount(f64::from(SENTINEL))],
                    vec![DEFAULT_PAYLOAD_SIZE],
                ),
                TargetList::Active(flows) => (
                    flows.iter().map(|f| f.address).collect(),
                    flows.iter().map(|f| BurstAmount(f.messages_in_burst)).collect(),
                    flows.iter().map(|f| f.payload_size).collect(),
                ),
            };

        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut payloads: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (target, size) in target_pes.iter().zip(&payload_sizes) {
            headers.insert(
                format!("Header{}", target),
                HEADER_FLITS.iter().map(|s| s.to_string()).collect(),
            );
            payloads.insert(format!("Payload{}", target), payload_template(*size));
        }

        let source_pes = vec![0];
        Self {
            amount_of_messages_in_burst: bursts,
            amount_of_source_pes: source_pes.len(),
            amount_of_target_pes: target_pes.len(),
            app_id,
            average_processing_time: PROCESSING_TIME,
            flow_type: FLOW_TYPE.to_string(),
            header_size: HEADER_SIZE,
            headers,
            injection_rate: record.injection_rate,
            injector_type: INJECTOR_TYPE.to_string(),
            pe_pos: record.address,
            payloads,
            rng_seed1: record.seeds.0,
            rng_seed2: record.seeds.1,
            source_pes,
            source_payload_size: SOURCE_PAYLOAD_SIZE,
            target_pes,
            target_payload_size: payload_sizes,
            thread_id,
            amount_of_messages_sent_flag: MESSAGES_SENT_FLAG,
            timestamp_flag: TIMESTAMP_FLAG,
        }
    }
}

/// `PlatformConfig.json`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDocument {
    #[serde(rename = "AmountOfBuses")]
    pub amount_of_buses: usize,
    #[serde(rename = "AmountOfCrossbars")]
    pub amount_of_crossbars: usize,
    #[serde(rename = "AmountOfPEs")]
    pub amount_of_pes: usize,
    #[serde(rename = "AmountOfPEsInBuses")]
    pub amount_of_pes_in_buses: Vec<usize>,
    #[serde(rename = "AmountOfPEsInCrossbars")]
    pub amount_of_pes_in_crossbars: Vec<usize>,
    #[serde(rename = "AmountOfWrappers")]
    pub amount_of_wrappers: usize,
    #[serde(rename = "BaseNoCDimensions")]
    pub base_noc_dimensions: [usize; 2],
    #[serde(rename = "NUMBER_PROCESSORS_X")]
    pub number_processors_x: usize,
    #[serde(rename = "NUMBER_PROCESSORS_Y")]
    pub number_processors_y: usize,
    #[serde(rename = "ReferenceClock")]
    pub reference_clock: u32,
    #[serde(rename = "SquareNoCBound")]
    pub square_noc_bound: usize,
    #[serde(rename = "WrapperAddresses")]
    pub wrapper_addresses: Vec<CellIndex>,
}

impl From<&Platform> for PlatformDocument {
    fn from(platform: &Platform) -> Self {
        Self {
            amount_of_buses: platform.bus_count(),
            amount_of_crossbars: platform.crossbar_count(),
            amount_of_pes: platform.total_endpoints(),
            amount_of_pes_in_buses: platform.bus_sizes().to_vec(),
            amount_of_pes_in_crossbars: platform.crossbar_sizes().to_vec(),
            amount_of_wrappers: platform.wrapper_count(),
            base_noc_dimensions: [platform.width(), platform.height()],
            number_processors_x: platform.width(),
            number_processors_y: platform.height(),
            reference_clock: platform.reference_clock_mhz(),
            square_noc_bound: platform.layout().bound(),
            wrapper_addresses: platform.wrapper_addresses(),
        }
    }
}

/// Recursively rebuilds every object with its keys in sorted order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Renders a document with sorted keys and a four-space indent.
pub fn to_pretty_json<T: Serialize>(document: &T) -> FlowResult<String> {
    let value = sort_keys(serde_json::to_value(document)?);
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    // serde_json only ever emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{BurstTarget, RateAdjustment};
    use crate::graph::ThreadRef;

    fn idle_injector(address: Address) -> InjectorRecord {
        InjectorRecord {
            address,
            binding: Binding::Unallocated,
            injection_rate: 0,
            adjustment: RateAdjustment::None,
            targets: TargetList::Idle,
            seeds: (11, 22),
        }
    }

    #[test]
    fn test_burst_amount_formatting() {
        let json = serde_json::to_string(&vec![BurstAmount(64.0), BurstAmount(0.5)]).unwrap();
        assert_eq!(json, "[64,0.5]");

        // Shortest round-trip form, not Python's zero-padded exponent.
        let tiny = serde_json::to_string(&BurstAmount(0.00001)).unwrap();
        assert_eq!(tiny, "1e-5");
        assert_eq!(serde_json::from_str::<f64>(&tiny).unwrap(), 0.00001);
    }

    #[test]
    fn test_payload_template() {
        let payload = payload_template(DEFAULT_PAYLOAD_SIZE);
        assert_eq!(payload.len(), 126);
        assert_eq!(&payload[..2], &["PEPOS", "TMSTP"]);
        assert!(payload[2..].iter().all(|f| f == "RANDO"));
    }

    #[test]
    fn test_pe_document_unallocated() {
        let record = EndpointRecord {
            address: 7,
            binding: Binding::Unallocated,
            clock_period: 2,
        };
        let json = to_pretty_json(&PeDocument::from(&record)).unwrap();
        let expected = r#"{
    "AppID": 99,
    "AverageProcessingTimeInClockPulses": 1,
    "CommStructure": "NOC",
    "InBufferSize": 128,
    "InjectorClockPeriod": 2,
    "InjectorType": "FXD",
    "OutBufferSize": 128,
    "PEPos": 7,
    "ThreadID": 99
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_idle_injector_document() {
        let doc = InjectorDocument::from(&idle_injector(3));
        assert_eq!(doc.target_pes, vec![99]);
        assert_eq!(doc.amount_of_messages_in_burst, vec![BurstAmount(99.0)]);
        assert_eq!(doc.target_payload_size, vec![126]);
        assert_eq!(doc.amount_of_target_pes, 1);
        assert!(doc.headers.contains_key("Header99"));
        assert_eq!(doc.payloads["Payload99"].len(), 126);
        assert_eq!((doc.rng_seed1, doc.rng_seed2), (11, 22));
    }

    #[test]
    fn test_injector_keys_sorted() {
        let record = InjectorRecord {
            address: 0,
            binding: Binding::Bound(ThreadRef::new(1, 4)),
            injection_rate: 60,
            adjustment: RateAdjustment::None,
            targets: TargetList::Active(vec![
                BurstTarget {
                    address: 12,
                    messages_in_burst: 128.0,
                    payload_size: 126,
                },
                BurstTarget {
                    address: 3,
                    messages_in_burst: 0.5,
                    payload_size: 126,
                },
            ]),
            seeds: (1, 2),
        };
        let json = to_pretty_json(&InjectorDocument::from(&record)).unwrap();

        let keys: Vec<&str> = json
            .lines()
            .filter(|l| l.starts_with("    \"") && !l.starts_with("        "))
            .filter_map(|l| l.trim().split('"').nth(1))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 21);

        assert!(json.contains("\"TargetPEs\": [\n        12,\n        3\n    ]"));
        assert!(json.contains("\"Header12\""));
        assert!(json.contains("0.5"));
        assert!(json.contains("\"AppID\": 1"));
    }
}
