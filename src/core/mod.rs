//! Core building blocks: network configuration, the tiling engine (axis
//! remapping, block/overlap resolution, planning, execution, adaptive retry),
//! and the normalize/resize collaborators applied around it.
pub mod config;
pub mod processing;
pub mod tiling;
