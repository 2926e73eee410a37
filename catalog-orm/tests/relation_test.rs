use catalog_orm::{Database, Error, Migration, Model, SchemaManager, async_trait};

#[derive(Debug, Clone, Model, PartialEq)]
#[orm(table = "blog_tag")]
struct Tag {
    #[orm(primary_key, auto_increment)]
    id: i64,
    #[orm(size = 30, unique)]
    label: String,
}

#[derive(Debug, Clone, Model, PartialEq)]
#[orm(table = "blog_post", many_to_many(tags = "Tag", related = "Post"))]
struct Post {
    #[orm(primary_key, auto_increment)]
    id: i64,
    title: String,
}

struct CreateBlog;

#[async_trait]
impl Migration for CreateBlog {
    fn app(&self) -> &'static str {
        "blog"
    }

    fn name(&self) -> &'static str {
        "0001_initial"
    }

    async fn up(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.create_model::<Tag>().await?;
        schema.create_model::<Post>().await
    }

    async fn down(&self, schema: &SchemaManager) -> Result<(), Error> {
        schema.drop_model::<Post>().await?;
        schema.drop_model::<Tag>().await
    }
}

async fn setup() -> Result<Database, Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;
    db.migrator().register(CreateBlog).run().await?;
    Ok(db)
}

async fn post(db: &Database, title: &str) -> Result<Post, Error> {
    db.model::<Post>().insert(&Post { id: 0, title: title.to_string() }).await
}

async fn tag(db: &Database, label: &str) -> Result<Tag, Error> {
    db.model::<Tag>().insert(&Tag { id: 0, label: label.to_string() }).await
}

#[tokio::test]
async fn test_join_tables_are_created() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    assert_eq!(db.get_table_columns("blog_post_tags").await?, ["post_id", "tag_id"]);
    assert_eq!(db.get_table_columns("blog_post_related").await?, ["from_post_id", "to_post_id"]);
    Ok(())
}

#[tokio::test]
async fn test_add_remove_set_clear() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let first = post(&db, "First").await?;
    let second = post(&db, "Second").await?;
    let rust = tag(&db, "rust").await?;
    let sql = tag(&db, "sql").await?;
    let async_ = tag(&db, "async").await?;

    let tags = db.many_to_many::<Post>("tags")?;
    assert_eq!(tags.info().join_table, "blog_post_tags");

    assert_eq!(tags.add(first.id, &[sql.id, rust.id, rust.id]).await?, 2);
    assert_eq!(tags.add(second.id, &[rust.id]).await?, 1);
    assert_eq!(tags.ids(first.id).await?, [rust.id, sql.id]);

    let fetched: Vec<Tag> = tags.fetch(first.id).await?;
    assert_eq!(fetched, vec![rust.clone(), sql.clone()]);

    assert_eq!(tags.remove(first.id, &[sql.id]).await?, 1);
    assert_eq!(tags.remove(first.id, &[]).await?, 0);

    tags.set(first.id, &[async_.id, sql.id]).await?;
    assert_eq!(tags.ids(first.id).await?, [sql.id, async_.id]);

    assert_eq!(tags.clear(first.id).await?, 2);
    assert!(tags.ids(first.id).await?.is_empty());
    assert_eq!(tags.ids(second.id).await?, [rust.id]);
    Ok(())
}

#[tokio::test]
async fn test_self_relation_and_cascades() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let a = post(&db, "A").await?;
    let b = post(&db, "B").await?;
    let c = post(&db, "C").await?;

    let related = db.many_to_many::<Post>("related")?;
    related.add(a.id, &[b.id, c.id]).await?;
    related.add(b.id, &[c.id]).await?;

    db.model::<Post>().equals("id", c.id).delete().await?;
    assert_eq!(related.ids(a.id).await?, [b.id]);
    assert!(related.ids(b.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_relation_errors() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let first = post(&db, "First").await?;

    assert!(matches!(db.many_to_many::<Post>("authors"), Err(Error::UnknownRelation { model: "post", .. })));
    assert!(matches!(db.many_to_many::<Tag>("tags"), Err(Error::UnknownRelation { model: "tag", .. })));

    let tags = db.many_to_many::<Post>("tags")?;
    let wrong: Result<Vec<Post>, _> = tags.fetch(first.id).await;
    assert!(matches!(wrong, Err(Error::RelationMismatch { expected: "blog_tag", found: "blog_post", .. })));

    // tag 99 does not exist
    assert!(tags.add(first.id, &[99]).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_unique_columns() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    tag(&db, "rust").await?;
    let err = tag(&db, "rust").await.expect_err("labels are unique");
    assert!(matches!(err, Error::Database(_)));
    Ok(())
}

#[tokio::test]
async fn test_relations_inside_transactions() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let first = post(&db, "First").await?;
    let rust = tag(&db, "rust").await?;

    let tx = db.begin().await?;
    tx.many_to_many::<Post>("tags")?.add(first.id, &[rust.id]).await?;
    tx.rollback().await?;

    assert!(db.many_to_many::<Post>("tags")?.ids(first.id).await?.is_empty());
    Ok(())
}
