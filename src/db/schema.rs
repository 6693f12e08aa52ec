//! DDL for creating the database and its schema (PostgreSQL).
//!
//! Every schema step is guarded so that re-running it against an already
//! provisioned database is a no-op.

use crate::db::script::Script;
use crate::types::{DbIdentifier, StoragePaths, quote_literal};

/// Login role that owns the application's objects.
#[derive(Debug, Clone)]
pub struct OwnerRole {
    pub name: DbIdentifier,
    pub password: Option<String>,
}

/// Creation script run against the administrative catalog.
///
/// Ensures the owner role, creates the database with fixed settings and
/// records the server storage locations it was created under.
pub fn database_creation_script(
    database: &DbIdentifier,
    owner: &OwnerRole,
    paths: &StoragePaths,
) -> Script {
    let role = owner.name.quoted();
    let db = database.quoted();

    Script::autocommit(format!("create database {database}"))
        .statement(format!(
            r#"DO $$
BEGIN
    IF NOT EXISTS (SELECT FROM pg_catalog.pg_roles WHERE rolname = {role_lit}) THEN
        CREATE ROLE {role} LOGIN;
    END IF;
END
$$"#,
            role_lit = owner.name.literal(),
        ))
        .secret_statement_if(owner.password.as_deref(), |password| {
            (
                format!(
                    "ALTER ROLE {role} WITH LOGIN PASSWORD {}",
                    quote_literal(password)
                ),
                format!("ALTER ROLE {role} WITH LOGIN PASSWORD ***"),
            )
        })
        .statement(format!(
            "CREATE DATABASE {db} WITH TEMPLATE = template0 ENCODING = 'UTF8' CONNECTION LIMIT = -1"
        ))
        .statement(format!(
            "COMMENT ON DATABASE {db} IS {}",
            quote_literal(&format!(
                "data_path={}; log_path={}",
                paths.data_path, paths.log_path
            ))
        ))
}

const NOTIFICATION_REQUESTS: &str = r#"
CREATE TABLE IF NOT EXISTS public."NotificationRequests" (
    "Id" INTEGER GENERATED BY DEFAULT AS IDENTITY NOT NULL,
    "Timestamp" TIMESTAMP NULL,
    "Body" TEXT NULL,
    CONSTRAINT "PK_NotificationRequests" PRIMARY KEY ("Id")
)
"#;

const TIMBERS_SYNC_REQUEST_DATA: &str = r#"
CREATE TABLE IF NOT EXISTS public."TimbersSyncRequestData" (
    "RequestId" INTEGER GENERATED BY DEFAULT AS IDENTITY NOT NULL,
    "Id" VARCHAR(255) NULL,
    "ExternalId" VARCHAR(255) NULL,
    "RequestNumber" INTEGER NULL,
    "Type" VARCHAR(255) NULL,
    "Action" VARCHAR(255) NULL,
    "ExtraData_Barcode" VARCHAR(255) NULL,
    "Status" VARCHAR(50) NULL,
    CONSTRAINT "PK_TimbersSyncRequestData" PRIMARY KEY ("RequestId")
)
"#;

const REQUEST_DATA_STORAGE: &str = r#"
CREATE TABLE IF NOT EXISTS public."RequestDataStorage" (
    "Id" INTEGER GENERATED BY DEFAULT AS IDENTITY NOT NULL,
    "RequestDataJson" TEXT NULL,
    "CreatedAt" TIMESTAMP NULL DEFAULT LOCALTIMESTAMP,
    "DataType" VARCHAR(255) NULL,
    "status" VARCHAR(50) NULL,
    CONSTRAINT "PK_RequestDataStorage" PRIMARY KEY ("Id")
)
"#;

// Join table; both columns are part of the key.
const NOTIFICATION_REQUEST_DATA_LINKS: &str = r#"
CREATE TABLE IF NOT EXISTS public."NotificationRequestDataLinks" (
    "NotificationRequestId" INTEGER NOT NULL,
    "TimbersSyncRequestDataId" INTEGER NOT NULL,
    CONSTRAINT "PK_NotificationRequestDataLinks" PRIMARY KEY ("NotificationRequestId", "TimbersSyncRequestDataId")
)
"#;

const LINKS_TIMBERS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS "IX_NotificationRequestDataLinks_TimbersSyncRequestDataId"
    ON public."NotificationRequestDataLinks" ("TimbersSyncRequestDataId")
"#;

// Constraint names stay under 63 bytes so the pg_constraint guard matches
// what the server stores.
const LINKS_FOREIGN_KEYS: [(&str, &str); 2] = [
    (
        "FK_NotificationRequestDataLinks_NotificationRequests",
        r#"FOREIGN KEY ("NotificationRequestId") REFERENCES public."NotificationRequests" ("Id") ON DELETE CASCADE"#,
    ),
    (
        "FK_NotificationRequestDataLinks_TimbersSyncRequestData",
        r#"FOREIGN KEY ("TimbersSyncRequestDataId") REFERENCES public."TimbersSyncRequestData" ("RequestId") ON DELETE CASCADE"#,
    ),
];

/// Table names created by [`schema_steps`], in creation order.
pub const TABLES: [&str; 4] = [
    "NotificationRequests",
    "TimbersSyncRequestData",
    "RequestDataStorage",
    "NotificationRequestDataLinks",
];

fn guarded_foreign_key(name: &str, definition: &str) -> String {
    format!(
        r#"DO $$
BEGIN
    IF NOT EXISTS (
        SELECT FROM pg_catalog.pg_constraint
        WHERE conname = {name_lit}
          AND conrelid = 'public."NotificationRequestDataLinks"'::regclass
    ) THEN
        ALTER TABLE public."NotificationRequestDataLinks"
            ADD CONSTRAINT "{name}" {definition};
    END IF;
END
$$"#,
        name_lit = quote_literal(name),
    )
}

fn if_role_exists(owner: &OwnerRole, body: &str) -> String {
    format!(
        r#"DO $$
BEGIN
    IF EXISTS (SELECT FROM pg_catalog.pg_roles WHERE rolname = {role_lit}) THEN
{body}
    END IF;
END
$$"#,
        role_lit = owner.name.literal(),
    )
}

/// Schema steps run against the target database, each in its own transaction.
pub fn schema_steps(database: &DbIdentifier, owner: &OwnerRole) -> Vec<Script> {
    let role = owner.name.quoted();

    vec![
        Script::transactional("owner_binding").statement(if_role_exists(
            owner,
            &format!(
                "        GRANT ALL PRIVILEGES ON DATABASE {db} TO {role};\n        GRANT ALL ON SCHEMA public TO {role};",
                db = database.quoted(),
            ),
        )),
        Script::transactional("notification_requests").statement(NOTIFICATION_REQUESTS.trim()),
        Script::transactional("timbers_sync_request_data")
            .statement(TIMBERS_SYNC_REQUEST_DATA.trim()),
        Script::transactional("request_data_storage").statement(REQUEST_DATA_STORAGE.trim()),
        Script::transactional("notification_request_data_links")
            .statement(NOTIFICATION_REQUEST_DATA_LINKS.trim()),
        Script::transactional("notification_request_data_links_index")
            .statement(LINKS_TIMBERS_INDEX.trim()),
        LINKS_FOREIGN_KEYS.iter().fold(
            Script::transactional("notification_request_data_links_foreign_keys"),
            |script, (name, definition)| script.statement(guarded_foreign_key(name, definition)),
        ),
        Script::transactional("owner_table_privileges").statement(if_role_exists(
            owner,
            &format!(
                "        GRANT ALL ON ALL TABLES IN SCHEMA public TO {role};\n        GRANT ALL ON ALL SEQUENCES IN SCHEMA public TO {role};"
            ),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(password: Option<&str>) -> OwnerRole {
        OwnerRole {
            name: DbIdentifier::parse("handshake").unwrap(),
            password: password.map(str::to_string),
        }
    }

    fn paths() -> StoragePaths {
        StoragePaths {
            data_path: "/var/lib/postgresql/data".to_string(),
            log_path: "/var/lib/postgresql/data/pg_wal".to_string(),
        }
    }

    #[test]
    fn creation_script_substitutes_name_and_paths() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let script = database_creation_script(&db, &owner(None), &paths());

        assert!(!script.is_transactional());
        let stmts = script.statements();
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].contains("rolname = 'handshake'"));
        assert!(stmts[0].contains("CREATE ROLE \"handshake\" LOGIN"));
        assert!(stmts[1].starts_with("CREATE DATABASE \"Orders\""));
        assert!(stmts[1].contains("ENCODING = 'UTF8'"));
        assert_eq!(
            stmts[2],
            "COMMENT ON DATABASE \"Orders\" IS 'data_path=/var/lib/postgresql/data; log_path=/var/lib/postgresql/data/pg_wal'"
        );
    }

    #[test]
    fn creation_script_sets_escaped_password_only_when_configured() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let script = database_creation_script(&db, &owner(Some("s3cr'et")), &paths());

        let stmts = script.statements();
        assert_eq!(stmts.len(), 4);
        assert_eq!(
            stmts[1],
            "ALTER ROLE \"handshake\" WITH LOGIN PASSWORD 's3cr''et'"
        );
        assert_eq!(
            script.label(1),
            "ALTER ROLE \"handshake\" WITH LOGIN PASSWORD ***"
        );
    }

    #[test]
    fn failed_password_statement_does_not_reveal_the_password() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let script = database_creation_script(&db, &owner(Some("s3cr'et")), &paths());

        let err = crate::error::ProvisionError::ScriptExecution {
            script: script.name().to_string(),
            statement: script.label(1).to_string(),
            source: sqlx::Error::Protocol("permission denied to alter role".to_string()),
        };
        let shown = err.to_string();
        assert!(!shown.contains("s3cr"), "{shown}");
        assert!(shown.contains("PASSWORD ***"), "{shown}");
    }

    #[test]
    fn creation_script_escapes_quotes_in_paths() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let odd = StoragePaths {
            data_path: "/srv/o'brien".to_string(),
            log_path: "/srv/o'brien/pg_wal".to_string(),
        };
        let script = database_creation_script(&db, &owner(None), &odd);
        assert!(script.statements()[2].contains("data_path=/srv/o''brien;"));
    }

    #[test]
    fn schema_steps_are_transactional_and_guarded() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let steps = schema_steps(&db, &owner(None));

        assert_eq!(steps.len(), 8);
        for step in &steps {
            assert!(step.is_transactional(), "{} not transactional", step.name());
            for stmt in step.statements() {
                assert!(
                    stmt.contains("IF NOT EXISTS") || stmt.contains("IF EXISTS"),
                    "unguarded statement in {}: {stmt}",
                    step.name()
                );
            }
        }
    }

    #[test]
    fn schema_creates_four_tables_one_index_two_cascading_foreign_keys() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let all: Vec<String> = schema_steps(&db, &owner(None))
            .into_iter()
            .flat_map(|s| s.statements().to_vec())
            .collect();

        let tables = all.iter().filter(|s| s.contains("CREATE TABLE")).count();
        let indexes = all.iter().filter(|s| s.contains("CREATE INDEX")).count();
        let fks: Vec<_> = all.iter().filter(|s| s.contains("FOREIGN KEY")).collect();

        assert_eq!(tables, TABLES.len());
        assert_eq!(indexes, 1);
        assert_eq!(fks.len(), 2);
        assert!(fks.iter().all(|s| s.contains("ON DELETE CASCADE")));
    }

    #[test]
    fn referenced_tables_are_created_before_the_join_table() {
        let db = DbIdentifier::parse("Orders").unwrap();
        let names: Vec<String> = schema_steps(&db, &owner(None))
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();

        assert!(pos("notification_requests") < pos("notification_request_data_links"));
        assert!(pos("timbers_sync_request_data") < pos("notification_request_data_links"));
        assert!(
            pos("notification_request_data_links")
                < pos("notification_request_data_links_foreign_keys")
        );
    }

    #[test]
    fn constraint_names_fit_in_an_identifier() {
        for (name, _) in LINKS_FOREIGN_KEYS {
            assert!(name.len() <= crate::types::identifier::MAX_IDENTIFIER_LEN);
        }
    }
}
