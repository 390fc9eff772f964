//! Taint markers attached to symbolic stack slots.
//!
//! Markers are plain values compared structurally. Detectors communicate
//! with themselves across opcodes solely by attaching markers to stack
//! slots and reading them back later.

use std::collections::HashSet;

/// Opaque identifier of a taint source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaintId(pub u32);

/// A taint marker carried by a stack slot.
///
/// Equality is kind plus payload: `StorageLoad(Some(1))` and
/// `StorageLoad(Some(2))` are different markers, although a [`MarkerSet`]
/// never holds both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    PushOne,
    DupOne,
    DupTwo,
    SwapOne,
    /// Storage read; carries the slot index when statically known.
    StorageLoad(Option<u64>),
    /// Storage write; carries the slot index when statically known.
    StorageSave(Option<u64>),
    /// Value produced by the CALLER opcode.
    Caller,
    /// Value derived from call data.
    Calldata,
    InputTaint(TaintId),
    StorageTaint(TaintId),
    /// Comparison of a caller value against a storage value; carries the
    /// storage slot index that was read.
    CallerCheck(u64),
}

/// Marker kind, payload ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    PushOne,
    DupOne,
    DupTwo,
    SwapOne,
    StorageLoad,
    StorageSave,
    Caller,
    Calldata,
    InputTaint,
    StorageTaint,
    CallerCheck,
}

impl Marker {
    pub fn kind(&self) -> MarkerKind {
        match self {
            Marker::PushOne => MarkerKind::PushOne,
            Marker::DupOne => MarkerKind::DupOne,
            Marker::DupTwo => MarkerKind::DupTwo,
            Marker::SwapOne => MarkerKind::SwapOne,
            Marker::StorageLoad(_) => MarkerKind::StorageLoad,
            Marker::StorageSave(_) => MarkerKind::StorageSave,
            Marker::Caller => MarkerKind::Caller,
            Marker::Calldata => MarkerKind::Calldata,
            Marker::InputTaint(_) => MarkerKind::InputTaint,
            Marker::StorageTaint(_) => MarkerKind::StorageTaint,
            Marker::CallerCheck(_) => MarkerKind::CallerCheck,
        }
    }
}

/// An unordered set of markers.
///
/// Holds at most one marker per kind. Inserting a second marker of a kind
/// already present keeps the existing one, whatever the payloads.
/// Markers are never removed for the lifetime of the set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerSet {
    markers: HashSet<Marker>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self {
            markers: HashSet::new(),
        }
    }

    /// Insert a marker. Returns false without changing the set when a
    /// marker of the same kind is already present.
    pub fn insert(&mut self, marker: Marker) -> bool {
        if self.contains_kind(marker.kind()) {
            return false;
        }
        self.markers.insert(marker)
    }

    pub fn contains(&self, marker: &Marker) -> bool {
        self.markers.contains(marker)
    }

    pub fn contains_kind(&self, kind: MarkerKind) -> bool {
        self.markers.iter().any(|m| m.kind() == kind)
    }

    pub fn contains_all(&self, markers: &[Marker]) -> bool {
        markers.iter().all(|m| self.contains(m))
    }

    /// The marker of the given kind, if any. Well-defined because the set
    /// holds at most one marker per kind.
    pub fn get(&self, kind: MarkerKind) -> Option<Marker> {
        self.markers.iter().find(|m| m.kind() == kind).copied()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }
}

impl FromIterator<Marker> for MarkerSet {
    fn from_iter<T: IntoIterator<Item = Marker>>(iter: T) -> Self {
        let mut set = Self::new();
        for marker in iter {
            set.insert(marker);
        }
        set
    }
}
