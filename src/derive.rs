//! Endpoint and injector record derivation.
//!
//! Once every structure is embedded and an allocation map is installed,
//! [`derive`] walks all addresses and produces one [`EndpointRecord`] and
//! one [`InjectorRecord`] per address. Derivation is a pure function of the
//! graph, the allocation and the clock; the only non-deterministic inputs
//! are the two RNG seeds drawn from a [`SeedSource`].
//!
//! # Injection rate
//!
//! Given the injector clock period `P = floor(100 / ReferenceClockMHz)`:
//!
//! | Condition | `InjectionRate` |
//! |-----------|-----------------|
//! | `TotalBandwidth == 0` | `0` |
//! | otherwise | `floor(TotalBandwidth * 100 / (32 * P))`, clamped to `[1, 100]` |

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::allocation::AllocationMap;
use crate::error::{FlowError, FlowResult};
use crate::graph::{CommGraph, ThreadRef};
use crate::types::{Address, Mbps};

/// Payload size, in flits, of every target.
pub const DEFAULT_PAYLOAD_SIZE: usize = 126;

/// Upper bound (inclusive) of the RNG seed range.
pub const MAX_SEED: u32 = 2_147_483_646;

/// Link data width, in bits, used by the injection-rate formula.
const LINK_WIDTH_BITS: f64 = 32.0;

/// Maximum injection rate (percent of link capacity).
pub const MAX_INJECTION_RATE: u8 = 100;

/// Injector clock period, in nanoseconds scaled by 100, for a reference
/// clock in MHz.
///
/// Clocks of 0 MHz or above 100 MHz give a zero period, which would make
/// the injection-rate division undefined, and are rejected.
pub fn injector_clock_period(reference_clock_mhz: u32) -> FlowResult<u32> {
    match 100u32.checked_div(reference_clock_mhz) {
        Some(period) if period > 0 => Ok(period),
        _ => Err(FlowError::DegenerateClock {
            mhz: reference_clock_mhz,
        }),
    }
}

/// Who executes at an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// A thread from the communication graph
    Bound(ThreadRef),
    /// No thread mapped here
    Unallocated,
}

impl Binding {
    pub fn thread(&self) -> Option<ThreadRef> {
        match self {
            Binding::Bound(t) => Some(*t),
            Binding::Unallocated => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }
}

/// Processing-element parameters for one address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointRecord {
    pub address: Address,
    pub binding: Binding,
    pub clock_period: u32,
}

/// Why a computed injection rate was adjusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateAdjustment {
    /// Rate used as computed
    None,
    /// Non-zero bandwidth computed to `0%`, raised to `1%`
    RaisedToMinimum,
    /// Computed rate exceeded `100%` and was capped
    CappedAtMaximum { computed: u64 },
}

/// One outgoing traffic flow of an injector.
#[derive(Clone, Debug, PartialEq)]
pub struct BurstTarget {
    /// Resolved address of the destination thread
    pub address: Address,
    /// Messages in each burst (the edge bandwidth)
    pub messages_in_burst: Mbps,
    /// Payload size in flits
    pub payload_size: usize,
}

/// Targets of an injector.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetList {
    /// No outgoing traffic; the simulator still expects one placeholder flow
    Idle,
    /// Real flows, in edge order
    Active(Vec<BurstTarget>),
}

impl TargetList {
    pub fn len(&self) -> usize {
        match self {
            TargetList::Idle => 1,
            TargetList::Active(targets) => targets.len(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TargetList::Idle)
    }
}

/// Traffic-injector parameters for one address.
#[derive(Clone, Debug, PartialEq)]
pub struct InjectorRecord {
    pub address: Address,
    pub binding: Binding,
    /// Percentage of link capacity, `0..=100`
    pub injection_rate: u8,
    pub adjustment: RateAdjustment,
    pub targets: TargetList,
    pub seeds: (u32, u32),
}

/// Source of the per-injector RNG seeds.
pub trait SeedSource {
    /// Draws a seed uniformly from `[0, MAX_SEED]`.
    fn next_seed(&mut self) -> u32;
}

/// Seeds drawn from a PRNG.
#[derive(Debug)]
pub struct RandomSeeds {
    rng: StdRng,
}

impl RandomSeeds {
    /// Seeds seeded from OS entropy; different on every run.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible seeds.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SeedSource for RandomSeeds {
    fn next_seed(&mut self) -> u32 {
        self.rng.gen_range(0..=MAX_SEED)
    }
}

/// Always returns the same seed. Used to compare runs byte-for-byte.
#[derive(Clone, Copy, Debug)]
pub struct FixedSeeds(pub u32);

impl SeedSource for FixedSeeds {
    fn next_seed(&mut self) -> u32 {
        self.0
    }
}

/// Computes the clamped injection rate for a thread's total bandwidth.
pub fn injection_rate(total_bandwidth: Mbps, clock_period: u32) -> (u8, RateAdjustment) {
    if total_bandwidth == 0.0 {
        return (0, RateAdjustment::None);
    }
    let computed = (total_bandwidth * 100.0 / (LINK_WIDTH_BITS * f64::from(clock_period))).floor() as u64;
    match computed {
        0 => (1, RateAdjustment::RaisedToMinimum),
        c if c > u64::from(MAX_INJECTION_RATE) => {
            (MAX_INJECTION_RATE, RateAdjustment::CappedAtMaximum { computed: c })
        }
        c => (c as u8, RateAdjustment::None),
    }
}

/// Endpoint and injector tables for a whole platform, indexed by address.
#[derive(Clone, Debug, Default)]
pub struct DerivedTables {
    pub endpoints: Vec<EndpointRecord>,
    pub injectors: Vec<InjectorRecord>,
}

impl DerivedTables {
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Injectors whose rate was clamped.
    pub fn adjusted(&self) -> impl Iterator<Item = &InjectorRecord> {
        self.injectors
            .iter()
            .filter(|i| i.adjustment != RateAdjustment::None)
    }
}

/// Immutable inputs shared by every per-address derivation.
struct DeriveContext<'a> {
    graph: &'a CommGraph,
    allocation: &'a AllocationMap,
    addresses: std::collections::HashMap<ThreadRef, Address>,
    clock_period: u32,
}

impl DeriveContext<'_> {
    fn derive_one(&self, address: Address, seeds: (u32, u32)) -> FlowResult<(EndpointRecord, InjectorRecord)> {
        let binding = match self.allocation.thread_at(address) {
            Some(thread) => Binding::Bound(thread),
            None => Binding::Unallocated,
        };

        let endpoint = EndpointRecord {
            address,
            binding,
            clock_period: self.clock_period,
        };

        let (injection_rate, adjustment, targets) = match binding {
            Binding::Unallocated => (0, RateAdjustment::None, TargetList::Idle),
            Binding::Bound(r) => {
                let thread = self.graph.thread(r).ok_or(FlowError::UnknownThread {
                    app: r.app,
                    thread: r.thread,
                })?;
                let (rate, adjustment) = injection_rate(thread.total_bandwidth(), self.clock_period);
                match adjustment {
                    RateAdjustment::RaisedToMinimum => tracing::warn!(
                        "Injection rate = 0% at injector {}, setting it to 1%",
                        address
                    ),
                    RateAdjustment::CappedAtMaximum { computed } => tracing::warn!(
                        "Injection rate > 100% ({}%) at injector {}, setting it to 100%",
                        computed,
                        address
                    ),
                    RateAdjustment::None => {}
                }

                let targets = if thread.total_bandwidth() == 0.0 {
                    TargetList::Idle
                } else {
                    let mut flows = Vec::with_capacity(thread.targets().len());
                    for target in thread.targets() {
                        let dst = self.addresses.get(&target.dst).copied().ok_or(
                            FlowError::UnresolvedTarget {
                                app: target.dst.app,
                                thread: target.dst.thread,
                            },
                        )?;
                        flows.push(BurstTarget {
                            address: dst,
                            messages_in_burst: target.bandwidth,
                            payload_size: DEFAULT_PAYLOAD_SIZE,
                        });
                    }
                    TargetList::Active(flows)
                };
                (rate, adjustment, targets)
            }
        };

        let injector = InjectorRecord {
            address,
            binding,
            injection_rate,
            adjustment,
            targets,
            seeds,
        };
        Ok((endpoint, injector))
    }
}

/// Derives the endpoint and injector tables for addresses `0..total`.
///
/// Seeds are drawn sequentially in address order before any record is
/// built, so the `parallel` feature yields the same output as the
/// sequential path for the same seed source.
pub fn derive(
    graph: &CommGraph,
    allocation: &AllocationMap,
    total: usize,
    clock_period: u32,
    seeds: &mut dyn SeedSource,
) -> FlowResult<DerivedTables> {
    let ctx = DeriveContext {
        graph,
        allocation,
        addresses: allocation.reverse(),
        clock_period,
    };

    let drawn: Vec<(u32, u32)> = (0..total)
        .map(|_| (seeds.next_seed(), seeds.next_seed()))
        .collect();

    #[cfg(feature = "parallel")]
    let records: Vec<(EndpointRecord, InjectorRecord)> = {
        use rayon::prelude::*;
        drawn
            .into_par_iter()
            .enumerate()
            .map(|(address, s)| ctx.derive_one(address, s))
            .collect::<FlowResult<Vec<_>>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let records: Vec<(EndpointRecord, InjectorRecord)> = drawn
        .into_iter()
        .enumerate()
        .map(|(address, s)| ctx.derive_one(address, s))
        .collect::<FlowResult<Vec<_>>>()?;

    let (endpoints, injectors): (Vec<_>, Vec<_>) = records.into_iter().unzip();

    let unbound = graph
        .threads()
        .filter(|t| !ctx.addresses.contains_key(&t.thread_ref()))
        .count();
    if unbound > 0 {
        tracing::debug!(unbound, "threads without an allocated address");
    }

    Ok(DerivedTables {
        endpoints,
        injectors,
    })
}
