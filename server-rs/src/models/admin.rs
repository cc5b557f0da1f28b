use match_engine::models::Role;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}
