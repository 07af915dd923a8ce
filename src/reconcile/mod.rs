//! Authoritative-set reconcilers.
//!
//! Each reconciler reads the remote collection, computes the difference
//! against the declared state, and issues the smallest set of calls that
//! makes the remote match. Planning is pure so it can be tested without a
//! server; the `async` halves only fetch and apply.
//!
//! Reconcilers fail fast on the first sub-error and never roll back: the next
//! plan re-runs them against the same declared state.

pub mod member_roles;
pub mod ordering;
pub mod overwrites;
pub mod role_position;

pub use self::member_roles::{plan_member_roles, reconcile_member_roles, RoleMembership};
pub use self::ordering::{
    apply_channel_order, apply_role_order, read_channel_order, read_role_order, ChannelPosition,
    RolePosition,
};
pub use self::overwrites::{plan_overwrites, reconcile_overwrites, DesiredOverwrite, OverwriteOp};
pub use self::role_position::{plan_role_swap, swap_role_position};
