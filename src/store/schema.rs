//! SQLite schema definitions for the microblog database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 1 - Users, posts, followers, messages, notifications
// =============================================================================

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("about_me", &SqlType::Text),
        sqlite_column!("last_seen", &SqlType::Integer, non_null = true),
        sqlite_column!("last_message_read_time", &SqlType::Integer),
        sqlite_column!("token_hash", &SqlType::Text, is_unique = true),
        sqlite_column!("token_expiration", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

const FOLLOWERS_TABLE_V1: Table = Table {
    name: "followers",
    columns: &[
        sqlite_column!(
            "follower_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "followed_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
    ],
    indices: &[("idx_followers_followed", "followed_id")],
    unique_constraints: &[&["follower_id", "followed_id"]],
};

const POSTS_TABLE_V1: Table = Table {
    name: "posts",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("body", &SqlType::Text, non_null = true),
        sqlite_column!("timestamp", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("language", &SqlType::Text),
    ],
    indices: &[
        ("idx_posts_timestamp", "timestamp"),
        ("idx_posts_user_timestamp", "user_id, timestamp"),
    ],
    unique_constraints: &[],
};

const MESSAGES_TABLE_V1: Table = Table {
    name: "messages",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "sender_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "recipient_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("body", &SqlType::Text, non_null = true),
        sqlite_column!("timestamp", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_messages_recipient_timestamp", "recipient_id, timestamp")],
    unique_constraints: &[],
};

const NOTIFICATIONS_TABLE_V1: Table = Table {
    name: "notifications",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("timestamp", &SqlType::Real, non_null = true),
        sqlite_column!("payload_json", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_notifications_user_name", "user_id, name"),
        ("idx_notifications_timestamp", "timestamp"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Background task records
// =============================================================================

const TASKS_TABLE_V2: Table = Table {
    name: "tasks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "complete",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("outcome", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_tasks_user_complete", "user_id, complete")],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    TASKS_TABLE_V2.create(conn)
}

pub const MICROBLOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            USERS_TABLE_V1,
            FOLLOWERS_TABLE_V1,
            POSTS_TABLE_V1,
            MESSAGES_TABLE_V1,
            NOTIFICATIONS_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            USERS_TABLE_V1,
            FOLLOWERS_TABLE_V1,
            POSTS_TABLE_V1,
            MESSAGES_TABLE_V1,
            NOTIFICATIONS_TABLE_V1,
            TASKS_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
