//! Example: Previewing a Schema Change
//!
//! Builds a small blog schema, treats it as the live database, then
//! evolves it and prints both the pending change summary and the SQL
//! the change compiles to for SQLite and PostgreSQL.
//!
//! Run with: cargo run --example plan_preview -p oxide-schema

use oxide_schema::prelude::*;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Creates `users` and `posts`, linked by `posts.author_id`.
fn blog_schema(db: &mut Database) -> Result<()> {
    let schema = db.default_schema();

    let users = db.create_table(schema, "users")?;
    let user_id = db.create_column(users, ColumnDefinition::new("id", DataType::Bigint).not_null())?;
    db.create_column(users, ColumnDefinition::new("username", DataType::Varchar(Some(100))).not_null())?;
    db.create_column(users, ColumnDefinition::new("bio", DataType::Text))?;
    db.create_primary_key(users, "pk_users", &[user_id])?;

    let posts = db.create_table(schema, "posts")?;
    let post_id = db.create_column(posts, ColumnDefinition::new("id", DataType::Bigint).not_null())?;
    let author = db.create_column(posts, ColumnDefinition::new("author_id", DataType::Bigint).not_null())?;
    db.create_column(posts, ColumnDefinition::new("title", DataType::Text).not_null())?;
    db.create_primary_key(posts, "pk_posts", &[post_id])?;
    let by_author = db.create_index(posts, IndexDefinition::new("ix_posts_author").column(author))?;
    db.create_foreign_key_to_table(
        ForeignKeyDefinition::new("fk_posts_author", by_author).on_delete(ForeignKeyAction::Cascade),
        users,
    )?;
    Ok(())
}

/// The second version: `bio` becomes required, `title` is renamed and
/// posts gain a publication flag.
fn evolve(db: &mut Database) -> Result<()> {
    let schema = db.default_schema();
    let users = db.get::<TableId>(schema, "users")?;
    let posts = db.get::<TableId>(schema, "posts")?;

    let bio = db.get::<ColumnId>(users, "bio")?;
    db.set_nullable(bio, false)?;
    db.set_default(bio, Some(lit("")))?;

    let title = db.get::<ColumnId>(posts, "title")?;
    db.rename(title, "headline")?;
    db.create_column(
        posts,
        ColumnDefinition::new("published", DataType::Boolean)
            .not_null()
            .default(lit(false)),
    )?;
    Ok(())
}

fn preview(label: &str, mut db: Database) -> Result<()> {
    blog_schema(&mut db)?;
    db.accept_changes();
    evolve(&mut db)?;

    println!("{}", "=".repeat(70));
    println!(" {label}");
    println!("{}", "=".repeat(70));
    println!("\n[1] Pending changes:\n");
    println!("{}", db.change_summary()?.to_json()?);

    db.flush()?;
    println!("\n[2] Generated SQL:\n");
    for action in db.pending_actions() {
        println!("{action}");
    }
    println!();
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    preview("SQLite", Database::sqlite())?;
    preview("PostgreSQL", Database::postgres())?;
    Ok(())
}
