//! Fixed, little-endian wire types for the master/worker protocol.
//!
//! Setup phase (master -> each worker, once per run), one message per tag:
//! affect rate, epsilon, box count, owned range, perimeters, neighbor counts,
//! neighbor offsets, self-overlaps, total neighbor count, neighbor ids,
//! overlaps. Then per iteration: a run flag followed, if the flag is
//! [`RUN_CONTINUE`], by the full current field; each worker answers with the
//! values of its owned range. The final run flag is [`RUN_TERMINATE`] and gets
//! no reply.

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;

use crate::algs::communicator::Communicator;
use crate::algs::partition::WorkerAssignment;
use crate::amr_error::AmrError;

/// Message tags, one per field of the protocol.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WireTag {
    AffectRate = 0,
    Epsilon = 1,
    BoxCount = 2,
    Perimeters = 3,
    NeighborCounts = 4,
    Offsets = 5,
    SelfOverlaps = 6,
    TotalNeighbors = 7,
    NeighborIds = 8,
    Overlaps = 9,
    Dsv = 10,
    Range = 11,
    Run = 12,
}

impl WireTag {
    #[inline]
    pub fn id(self) -> u16 {
        self as u16
    }
}

pub const RUN_CONTINUE: u64 = 1;
pub const RUN_TERMINATE: u64 = 0;

/// A `u64` carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireU64 {
    pub v_le: u64,
}

impl WireU64 {
    pub fn of(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.v_le)
    }
}

/// An `f64` carried on the wire as its little-endian bit pattern.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireF64 {
    pub bits_le: u64,
}

impl WireF64 {
    pub fn of(v: f64) -> Self {
        Self {
            bits_le: v.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}

/// Owned range `[start, end)`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireRange {
    pub start_le: u64,
    pub end_le: u64,
}

impl WireRange {
    pub fn of(a: WorkerAssignment) -> Self {
        Self {
            start_le: (a.start as u64).to_le(),
            end_le: (a.end as u64).to_le(),
        }
    }
    pub fn get(&self) -> WorkerAssignment {
        WorkerAssignment {
            start: u64::from_le(self.start_le) as usize,
            end: u64::from_le(self.end_le) as usize,
        }
    }
}

fn expect_len(peer: usize, tag: WireTag, bytes: &Bytes, expected: usize) -> Result<(), AmrError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(AmrError::WireLength {
            peer,
            tag: tag.id(),
            expected,
            actual: bytes.len(),
        })
    }
}

/// Copy a received message into a slice of Pod records (handles unaligned input).
fn decode_into<T: Pod>(
    peer: usize,
    tag: WireTag,
    bytes: &Bytes,
    out: &mut [T],
) -> Result<(), AmrError> {
    let dst: &mut [u8] = bytemuck::cast_slice_mut(out);
    expect_len(peer, tag, bytes, dst.len())?;
    dst.copy_from_slice(bytes);
    Ok(())
}

pub fn send_f64s<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: WireTag,
    values: &[f64],
) -> Result<(), AmrError> {
    let wire: Vec<WireF64> = values.iter().copied().map(WireF64::of).collect();
    comm.send(peer, tag.id(), bytemuck::cast_slice(&wire))
}

/// Receive exactly `out.len()` reals into `out`.
pub fn recv_f64s_into<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: WireTag,
    out: &mut [f64],
) -> Result<(), AmrError> {
    let bytes = comm.recv(peer, tag.id())?;
    let mut wire = vec![WireF64::zeroed(); out.len()];
    decode_into(peer, tag, &bytes, &mut wire)?;
    for (o, w) in out.iter_mut().zip(&wire) {
        *o = w.get();
    }
    Ok(())
}

pub fn recv_f64s<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: WireTag,
    len: usize,
) -> Result<Vec<f64>, AmrError> {
    let mut out = vec![0.0; len];
    recv_f64s_into(comm, peer, tag, &mut out)?;
    Ok(out)
}

pub fn send_usizes<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: WireTag,
    values: &[usize],
) -> Result<(), AmrError> {
    let wire: Vec<WireU64> = values.iter().map(|&v| WireU64::of(v as u64)).collect();
    comm.send(peer, tag.id(), bytemuck::cast_slice(&wire))
}

pub fn recv_usizes<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: WireTag,
    len: usize,
) -> Result<Vec<usize>, AmrError> {
    let bytes = comm.recv(peer, tag.id())?;
    let mut wire = vec![WireU64::zeroed(); len];
    decode_into(peer, tag, &bytes, &mut wire)?;
    Ok(wire.iter().map(|w| w.get() as usize).collect())
}

pub fn send_u64<C: Communicator>(comm: &C, peer: usize, tag: WireTag, v: u64) -> Result<(), AmrError> {
    comm.send(peer, tag.id(), bytemuck::bytes_of(&WireU64::of(v)))
}

pub fn recv_u64<C: Communicator>(comm: &C, peer: usize, tag: WireTag) -> Result<u64, AmrError> {
    let bytes = comm.recv(peer, tag.id())?;
    let mut w = [WireU64::zeroed()];
    decode_into(peer, tag, &bytes, &mut w)?;
    Ok(w[0].get())
}

pub fn send_f64<C: Communicator>(comm: &C, peer: usize, tag: WireTag, v: f64) -> Result<(), AmrError> {
    comm.send(peer, tag.id(), bytemuck::bytes_of(&WireF64::of(v)))
}

pub fn recv_f64<C: Communicator>(comm: &C, peer: usize, tag: WireTag) -> Result<f64, AmrError> {
    let bytes = comm.recv(peer, tag.id())?;
    let mut w = [WireF64::zeroed()];
    decode_into(peer, tag, &bytes, &mut w)?;
    Ok(w[0].get())
}

pub fn send_range<C: Communicator>(
    comm: &C,
    peer: usize,
    owned: WorkerAssignment,
) -> Result<(), AmrError> {
    comm.send(peer, WireTag::Range.id(), bytemuck::bytes_of(&WireRange::of(owned)))
}

pub fn recv_range<C: Communicator>(comm: &C, peer: usize) -> Result<WorkerAssignment, AmrError> {
    let bytes = comm.recv(peer, WireTag::Range.id())?;
    let mut w = [WireRange::zeroed()];
    decode_into(peer, WireTag::Range, &bytes, &mut w)?;
    let owned = w[0].get();
    if owned.start > owned.end {
        return Err(AmrError::Communication(format!(
            "reversed range [{}, {})",
            owned.start, owned.end
        )));
    }
    Ok(owned)
}

/// Decode a run flag, rejecting anything but the two sentinels.
pub fn run_flag(v: u64) -> Result<bool, AmrError> {
    match v {
        RUN_CONTINUE => Ok(true),
        RUN_TERMINATE => Ok(false),
        other => Err(AmrError::UnexpectedFlag(other)),
    }
}
