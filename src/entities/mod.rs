// Entity Models
//
// Organizations are global. Contracts, invitations and users are owned by
// exactly one organization (see scoping.rs). Contract families are global
// reference data.

pub mod organization;
pub mod contract;
pub mod family;
pub mod invitation;
pub mod user;

pub use organization::{Organization, OrganizationIndex};
pub use contract::Contract;
pub use family::{ContractFamily, FamilyNode, FamilySeed, FamilyTree, FamilyTreeError, DEFAULT_FAMILIES};
pub use invitation::{accept_invitation, Invitation, InvitationError, DEFAULT_TTL_DAYS};
pub use user::User;
