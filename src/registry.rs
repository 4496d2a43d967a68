//! Static catalog of permissionable modules and built-in roles, and the
//! startup routines that mirror it into the store.
use crate::{
    authz::SUPER_ADMIN_KEY,
    error::AppError,
    models::{NewModule, NewRole},
    repository::Repository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub is_system: bool,
}

pub const MODULE_REGISTRY: &[ModuleDefinition] = &[
    ModuleDefinition {
        key: "users",
        name: "Users",
        description: Some("User management"),
    },
    ModuleDefinition {
        key: "access_control",
        name: "Access Control",
        description: Some("Roles and permissions management"),
    },
    ModuleDefinition {
        key: "reports",
        name: "Reports",
        description: Some("Reporting and analytics"),
    },
    ModuleDefinition {
        key: "inventory",
        name: "Inventory",
        description: Some("Inventory management"),
    },
];

pub const BUILTIN_ROLES: &[RoleDefinition] = &[
    RoleDefinition {
        key: SUPER_ADMIN_KEY,
        name: "Super Administrator",
        description: "Full access to every module",
        is_system: true,
    },
    RoleDefinition {
        key: "ADMIN",
        name: "Administrator",
        description: "Administrative access",
        is_system: false,
    },
    RoleDefinition {
        key: "USER",
        name: "User",
        description: "Standard user",
        is_system: false,
    },
];

/// Outcome of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// sync_modules
///
/// Inserts registry modules missing from the store and refreshes name and
/// description where they drifted. Persisted modules absent from the registry
/// are left in place. A second run over the same registry writes nothing.
pub async fn sync_modules(
    repo: &dyn Repository,
    registry: &[ModuleDefinition],
) -> Result<SyncReport, AppError> {
    let mut report = SyncReport::default();

    for definition in registry {
        match repo.get_module_by_key(definition.key).await? {
            Some(existing) => {
                if existing.name == definition.name
                    && existing.description.as_deref() == definition.description
                {
                    report.unchanged += 1;
                    continue;
                }
                repo.update_module(existing.id, definition.name, definition.description)
                    .await?;
                report.updated += 1;
            }
            None => {
                repo.insert_module(NewModule {
                    key: definition.key.to_string(),
                    name: definition.name.to_string(),
                    description: definition.description.map(str::to_string),
                })
                .await?;
                report.inserted += 1;
            }
        }
    }

    tracing::info!(
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        "module registry synced"
    );
    Ok(report)
}

/// Creates any built-in role that does not exist yet. Existing roles are not touched.
pub async fn seed_roles(repo: &dyn Repository, roles: &[RoleDefinition]) -> Result<usize, AppError> {
    let mut created = 0;
    for definition in roles {
        if repo.get_role_by_key(definition.key).await?.is_some() {
            continue;
        }
        repo.insert_role(NewRole {
            key: definition.key.to_string(),
            name: definition.name.to_string(),
            description: Some(definition.description.to_string()),
            is_system: definition.is_system,
        })
        .await?;
        created += 1;
    }

    if created > 0 {
        tracing::info!(created, "built-in roles seeded");
    }
    Ok(created)
}

/// Runs role seeding followed by module sync.
pub async fn provision(repo: &dyn Repository) -> Result<(), AppError> {
    seed_roles(repo, BUILTIN_ROLES).await?;
    sync_modules(repo, MODULE_REGISTRY).await?;
    Ok(())
}
