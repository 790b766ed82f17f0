//! Sample user-directory procedures served by `formrpc-server`.
//!
//! | Path         | Kind     | Input                                   |
//! |--------------|----------|-----------------------------------------|
//! | `getUser`    | query    | `name` (text)                           |
//! | `listUsers`  | query    | optional `{ "prefix": .. }`             |
//! | `createUser` | mutation | `name` (text), `age` (numeric)          |
//! | `uploadFile` | mutation | `bobfile` (drained), `joefile` (handle) |

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ErrorCode, RpcError};
use crate::routing::{Router, RouterBuilder, RouterError};
use crate::store::MemoryStore;
use crate::validation::{FormSchema, SerdeValidator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserFilter {
    pub prefix: Option<String>,
}

/// Server state shared by every procedure.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub users: MemoryStore<String, User>,
}

pub fn procedures() -> RouterBuilder<AppState> {
    Router::<AppState>::builder()
        .query("getUser", FormSchema::new().text("name"), |ctx, form| async move {
            let name = form.text("name").unwrap_or_default();
            ctx.state
                .users
                .get(&name.to_string())
                .ok_or_else(|| RpcError::not_found("User not found"))
        })
        .query(
            "listUsers",
            SerdeValidator::<Option<UserFilter>>::new(),
            |ctx, filter| async move {
                let prefix = filter.and_then(|f| f.prefix).unwrap_or_default();
                let mut users: Vec<User> = ctx
                    .state
                    .users
                    .values()
                    .into_iter()
                    .filter(|u| u.name.starts_with(&prefix))
                    .collect();
                users.sort_by(|a, b| a.name.cmp(&b.name));
                Ok::<_, RpcError>(users)
            },
        )
        .mutation(
            "createUser",
            FormSchema::new().text("name").numeric("age").typed::<User>(),
            |ctx, user| async move {
                if !ctx.state.users.insert_new(user.name.clone(), user.clone()) {
                    return Err(RpcError::new(
                        ErrorCode::Conflict,
                        format!("User \"{}\" already exists", user.name),
                    ));
                }
                tracing::info!(request_id = ctx.request_id.as_deref().unwrap_or("unknown"), name = %user.name, "User created");
                Ok(user)
            },
        )
        .mutation(
            "uploadFile",
            FormSchema::new().blob("bobfile").file("joefile"),
            |_ctx, form| async move {
                let bob = form
                    .blob("bobfile")
                    .ok_or_else(|| RpcError::bad_request("bobfile is missing"))?
                    .text()?;
                let joe = form
                    .file("joefile")
                    .ok_or_else(|| RpcError::bad_request("joefile is missing"))?;
                Ok::<Value, RpcError>(json!({ "bob": bob, "joeFilename": joe.filename() }))
            },
        )
}

/// The sample router with an empty user directory.
pub fn router() -> Result<Router<AppState>, RouterError> {
    procedures().build(AppState::default())
}
