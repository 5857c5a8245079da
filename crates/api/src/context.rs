use agrolog_core::OwnerId;

/// Owner scope for a request, taken from the bearer token's subject.
///
/// Present on every authenticated route; handlers never read the owner from
/// the request body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OwnerContext {
    owner_id: OwnerId,
}

impl OwnerContext {
    pub fn new(owner_id: OwnerId) -> Self {
        Self { owner_id }
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}
