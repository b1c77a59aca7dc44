// SPDX-License-Identifier: GPL-3.0-only

//! Logical volume reconciliation
//!
//! Converges one declared logical volume onto the live LVM state:
//!
//! 1. [`validate`] the spec and parse its size token
//! 2. [`resize_physical_volumes`] so device growth shows up as free extents
//! 3. re-read the group and [`decide`] between create, extend and no-op
//! 4. run the command built by the [`emitter`]
//! 5. format and mount the volume when asked to
//!
//! [`Reconciler`] ties the steps together behind the collaborator traits of
//! `storage-contracts`; every other module is pure or takes its
//! collaborators explicitly.

pub mod decision;
pub mod emitter;
mod exec;
pub mod extents;
pub mod pv_resize;
pub mod reconciler;
pub mod validate;

pub use decision::{Action, NoOpReason, decide};
pub use extents::{SizeTarget, bytes_to_extents, current_extents, resolve};
pub use pv_resize::resize_physical_volumes;
pub use reconciler::{Outcome, Plan, Reconciler};
pub use validate::validate;
