use newsdesk::db::schema::{self, SlugColumnState};
use newsdesk::db::SlugMigrator;
use newsdesk::error::MigrationStage;
use newsdesk::models::{
    ArticleFilter, ArticleStatus, CreateArticle, NewUser, SubscriberFilter, SubscriberStatus,
    Subscription, UpdateArticle, UpdateUser, UserRole, UserStatus,
};
use newsdesk::services::{articles, auth, categories, health, newsletter};
use newsdesk::{Database, MigrationError, StoreError};

fn unique_name(prefix: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    format!("{}_{}", prefix, id)
}

fn create_test_db() -> Database {
    let db = Database::open_memory(&unique_name("test_db")).expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

/// An unmigrated database holding `ddl` and `rows` as they were before slugs existed.
fn create_legacy_db(ddl: &str, rows: &str) -> Database {
    let db = Database::open_memory(&unique_name("legacy_db")).expect("Failed to create test database");
    {
        let conn = db.get().unwrap();
        conn.execute_batch(ddl).unwrap();
        conn.execute_batch(rows).unwrap();
    }
    db
}

const LEGACY_ARTICLES: &str = r#"
CREATE TABLE articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    subtitle TEXT,
    body TEXT NOT NULL,
    category TEXT NOT NULL,
    author TEXT NOT NULL,
    author_id INTEGER,
    image_url TEXT,
    status TEXT NOT NULL DEFAULT 'published' CHECK(status IN ('draft', 'published', 'archived')),
    tags TEXT,
    featured INTEGER NOT NULL DEFAULT 0,
    source TEXT,
    views INTEGER NOT NULL DEFAULT 0,
    newsletter_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);
"#;

const LEGACY_UNCONSTRAINED: &str = r#"
CREATE TABLE articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    subtitle TEXT,
    body TEXT NOT NULL,
    category TEXT NOT NULL,
    author TEXT NOT NULL,
    author_id INTEGER,
    image_url TEXT,
    status TEXT NOT NULL DEFAULT 'published',
    tags TEXT,
    featured INTEGER NOT NULL DEFAULT 0,
    source TEXT,
    views INTEGER NOT NULL DEFAULT 0,
    newsletter_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
    slug TEXT
);
CREATE INDEX idx_articles_slug ON articles(slug);
"#;

fn article(title: &str) -> CreateArticle {
    CreateArticle {
        title: title.to_string(),
        body: "Full story.".to_string(),
        category: "Politics".to_string(),
        author: "News Desk".to_string(),
        ..Default::default()
    }
}

fn all_slugs(db: &Database) -> Vec<Option<String>> {
    let conn = db.get().unwrap();
    let mut stmt = conn.prepare("SELECT slug FROM articles ORDER BY id").unwrap();
    let slugs = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    slugs
}

fn schema_snapshot(db: &Database) -> Vec<(String, String, Option<String>)> {
    let conn = db.get().unwrap();
    let mut stmt = conn
        .prepare("SELECT type, name, sql FROM sqlite_master ORDER BY type, name")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    rows
}

const TEST_PASSWORD: &str = "Password123";
const NEW_PASSWORD: &str = "NewPass456";

fn new_user(name: &str, email: &str, role: UserRole) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        role,
        status: UserStatus::Active,
        notes: None,
    }
}

mod migration_integration_tests {
    use super::*;

    #[test]
    fn test_fresh_database_ends_unique() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        assert_eq!(
            schema::slug_column_state(&conn).unwrap(),
            SlugColumnState::Unique
        );
    }

    #[test]
    fn test_migrates_table_without_slug_column() {
        let db = create_legacy_db(
            LEGACY_ARTICLES,
            r#"
            INSERT INTO articles (title, body, category, author) VALUES
                ('Quarto Poder', 'a', 'Politics', 'Ana'),
                ('Quarto Poder', 'b', 'Politics', 'Ana'),
                ('Eleição municipal', 'c', 'Politics', 'Rui'),
                ('!!!', 'd', 'Culture', 'Rui');
            "#,
        );

        let report = db.migrate().expect("migration should succeed");
        assert_eq!(report.initial_state, SlugColumnState::Absent);
        assert!(report.column_added);
        assert_eq!(report.backfilled, 4);
        assert!(report.rebuilt);

        let slugs: Vec<String> = all_slugs(&db).into_iter().map(Option::unwrap).collect();
        assert_eq!(
            slugs,
            ["quarto-poder", "quarto-poder-1", "eleicao-municipal", "article"]
        );

        let conn = db.get().unwrap();
        assert_eq!(
            schema::slug_column_state(&conn).unwrap(),
            SlugColumnState::Unique
        );
    }

    #[test]
    fn test_migration_preserves_rows_and_values() {
        let db = create_legacy_db(
            LEGACY_ARTICLES,
            r#"
            INSERT INTO articles (title, subtitle, body, category, author, views, featured, tags) VALUES
                ('First', 'sub', 'body one', 'Sports', 'Ana', 42, 1, 'a,b'),
                ('Second', NULL, 'body two', 'Economy', 'Rui', 7, 0, NULL);
            "#,
        );
        db.migrate().unwrap();

        let first = articles::get_by_id(&db, 1).unwrap().unwrap();
        assert_eq!(first.title, "First");
        assert_eq!(first.subtitle.as_deref(), Some("sub"));
        assert_eq!(first.views, 42);
        assert!(first.featured);
        assert_eq!(first.tags.as_deref(), Some("a,b"));
        assert_eq!(first.slug, "first");

        let second = articles::get_by_id(&db, 2).unwrap().unwrap();
        assert_eq!(second.category, "Economy");
        assert_eq!(second.slug, "second");
    }

    #[test]
    fn test_repairs_unconstrained_column_with_duplicates_and_gaps() {
        let db = create_legacy_db(
            LEGACY_UNCONSTRAINED,
            r#"
            INSERT INTO articles (title, body, category, author, slug) VALUES
                ('Budget vote', 'a', 'Economy', 'Ana', 'budget'),
                ('Budget again', 'b', 'Economy', 'Ana', 'budget'),
                ('No slug yet', 'c', 'Economy', 'Ana', NULL),
                ('Blank slug', 'd', 'Economy', 'Ana', ''),
                ('Budget', 'e', 'Economy', 'Ana', NULL);
            "#,
        );

        let report = db.migrate().unwrap();
        assert_eq!(report.initial_state, SlugColumnState::Unconstrained);
        assert!(!report.column_added);
        assert_eq!(report.backfilled, 4);
        assert!(report.rebuilt);

        let slugs: Vec<String> = all_slugs(&db).into_iter().map(Option::unwrap).collect();
        assert_eq!(
            slugs,
            ["budget", "budget-1", "no-slug-yet", "blank-slug", "budget-2"]
        );
    }

    #[test]
    fn test_all_slugs_distinct_and_non_empty_after_migration() {
        let mut rows = String::from(
            "INSERT INTO articles (title, body, category, author, slug) VALUES ",
        );
        let values: Vec<String> = (0..50)
            .map(|i| {
                let slug = match i % 3 {
                    0 => "NULL".to_string(),
                    1 => "'same'".to_string(),
                    _ => format!("'item-{}'", i % 7),
                };
                format!("('Same Title', 'x', 'Politics', 'Ana', {})", slug)
            })
            .collect();
        rows.push_str(&values.join(", "));
        rows.push(';');

        let db = create_legacy_db(LEGACY_UNCONSTRAINED, &rows);
        db.migrate().unwrap();

        let slugs: Vec<String> = all_slugs(&db).into_iter().map(Option::unwrap).collect();
        assert_eq!(slugs.len(), 50);
        let distinct: std::collections::HashSet<_> = slugs.iter().collect();
        assert_eq!(distinct.len(), 50);
        assert!(slugs.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn test_second_run_is_noop() {
        let db = create_legacy_db(
            LEGACY_ARTICLES,
            "INSERT INTO articles (title, body, category, author) VALUES ('Hello', 'x', 'Politics', 'Ana');",
        );
        let first = db.migrate().unwrap();
        assert!(!first.is_noop());

        let schema_before = schema_snapshot(&db);
        let slugs_before = all_slugs(&db);

        let second = db.migrate().unwrap();
        assert!(second.is_noop());
        assert_eq!(second.initial_state, SlugColumnState::Unique);
        assert_eq!(schema_snapshot(&db), schema_before);
        assert_eq!(all_slugs(&db), slugs_before);
    }

    #[test]
    fn test_lookup_indexes_exist_after_rebuild() {
        let db = create_test_db();
        let conn = db.get().unwrap();
        let names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'articles'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        for expected in [
            "idx_articles_slug",
            "idx_articles_category",
            "idx_articles_status",
            "idx_articles_created",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_autoincrement_survives_rebuild() {
        let db = create_legacy_db(
            LEGACY_ARTICLES,
            r#"
            INSERT INTO articles (title, body, category, author) VALUES
                ('One', 'x', 'Politics', 'Ana'),
                ('Two', 'x', 'Politics', 'Ana'),
                ('Three', 'x', 'Politics', 'Ana');
            DELETE FROM articles WHERE id = 3;
            "#,
        );
        db.migrate().unwrap();

        let created = articles::create_article(&db, article("Four"), None).unwrap();
        assert_eq!(created.id, 4);
    }

    #[test]
    fn test_refuses_to_drop_unknown_columns() {
        let ddl = LEGACY_ARTICLES.replace(
            "updated_at TEXT DEFAULT CURRENT_TIMESTAMP",
            "updated_at TEXT DEFAULT CURRENT_TIMESTAMP,\n    legacy_notes TEXT",
        );
        let db = create_legacy_db(
            &ddl,
            "INSERT INTO articles (title, body, category, author, legacy_notes) VALUES ('Keep me', 'x', 'Politics', 'Ana', 'important');",
        );

        let err = db.migrate().expect_err("rebuild must refuse to drop data");
        match err.downcast_ref::<MigrationError>() {
            Some(MigrationError::Incomplete { stage, reason }) => {
                assert_eq!(*stage, MigrationStage::Rebuild);
                assert!(reason.contains("legacy_notes"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let conn = db.get().unwrap();
        assert_eq!(
            schema::slug_column_state(&conn).unwrap(),
            SlugColumnState::Unconstrained
        );
        assert!(schema::has_column(&conn, "articles", "legacy_notes").unwrap());
        let notes: String = conn
            .query_row("SELECT legacy_notes FROM articles WHERE id = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(notes, "important");
    }

    #[test]
    fn test_plan_previews_without_writing() {
        let db = create_legacy_db(
            LEGACY_UNCONSTRAINED,
            r#"
            INSERT INTO articles (title, body, category, author, slug) VALUES
                ('Hello', 'x', 'Politics', 'Ana', NULL),
                ('Hello', 'x', 'Politics', 'Ana', NULL);
            "#,
        );

        let plan = SlugMigrator::new(&db).plan().unwrap();
        let slugs: Vec<&str> = plan.iter().map(|a| a.slug.as_str()).collect();
        assert_eq!(slugs, ["hello", "hello-1"]);
        assert_eq!(all_slugs(&db), vec![None, None]);
    }

    #[test]
    fn test_migration_status_lists_base_migration() {
        let db = create_test_db();
        let statuses = db.get_migration_status().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].0, 1);
        assert!(statuses[0].1.is_some());
    }
}

mod article_integration_tests {
    use super::*;

    #[test]
    fn test_identical_titles_get_distinct_slugs() {
        let db = create_test_db();

        let first = articles::create_article(&db, article("Breaking News"), None).unwrap();
        let second = articles::create_article(&db, article("Breaking News"), None).unwrap();

        assert_eq!(first.slug, "breaking-news");
        assert_eq!(second.slug, "breaking-news-1");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_explicit_slug_is_used_and_normalized() {
        let db = create_test_db();

        let mut input = article("Whatever");
        input.slug = Some("custom-path".to_string());
        let created = articles::create_article(&db, input, None).unwrap();
        assert_eq!(created.slug, "custom-path");

        let mut input = article("Whatever");
        input.slug = Some("  Not A Slug! ".to_string());
        let created = articles::create_article(&db, input, None).unwrap();
        assert_eq!(created.slug, "not-a-slug");

        let mut input = article("Fallback To Title");
        input.slug = Some("   ".to_string());
        let created = articles::create_article(&db, input, None).unwrap();
        assert_eq!(created.slug, "fallback-to-title");
    }

    #[test]
    fn test_create_reports_missing_fields() {
        let db = create_test_db();

        let err = articles::create_article(
            &db,
            CreateArticle {
                title: "Only a title".to_string(),
                ..Default::default()
            },
            None,
        )
        .unwrap_err();

        match err {
            StoreError::MissingField(fields) => {
                assert_eq!(fields, ["body", "category", "author"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(articles::list_articles(&db, &ArticleFilter::default(), 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_create_defaults_to_published() {
        let db = create_test_db();
        let created = articles::create_article(&db, article("Status check"), Some(1)).unwrap();
        assert_eq!(created.status, ArticleStatus::Published);
        assert_eq!(created.views, 0);
    }

    #[test]
    fn test_update_collision_is_disambiguated() {
        let db = create_test_db();
        let taken = articles::create_article(&db, article("Election Night"), None).unwrap();
        let other = articles::create_article(&db, article("Something Else"), None).unwrap();

        let updated = articles::update_article(
            &db,
            other.id,
            UpdateArticle {
                slug: Some(taken.slug.clone()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(updated.slug, "election-night-1");
        let untouched = articles::get_by_id(&db, taken.id).unwrap().unwrap();
        assert_eq!(untouched.slug, "election-night");
    }

    #[test]
    fn test_update_to_own_slug_keeps_it() {
        let db = create_test_db();
        let created = articles::create_article(&db, article("Own Slug"), None).unwrap();

        let updated = articles::update_article(
            &db,
            created.id,
            UpdateArticle {
                slug: Some("own-slug".to_string()),
                body: Some("Revised".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.slug, "own-slug");
        assert_eq!(updated.body, "Revised");
    }

    #[test]
    fn test_update_without_slug_leaves_it_alone() {
        let db = create_test_db();
        let created = articles::create_article(&db, article("Original Title"), None).unwrap();

        let updated = articles::update_article(
            &db,
            created.id,
            UpdateArticle {
                title: Some("A Completely New Title".to_string()),
                slug: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.title, "A Completely New Title");
        assert_eq!(updated.slug, "original-title");
        assert_eq!(updated.category, "Politics");
    }

    #[test]
    fn test_update_can_clear_optional_fields() {
        let db = create_test_db();
        let mut input = article("With extras");
        input.subtitle = Some("A subtitle".to_string());
        input.tags = Some("a,b".to_string());
        input.source = Some("Wire".to_string());
        let created = articles::create_article(&db, input, None).unwrap();

        let updated = articles::update_article(
            &db,
            created.id,
            UpdateArticle {
                subtitle: Some(None),
                tags: Some(Some("c".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(updated.subtitle, None);
        assert_eq!(updated.tags.as_deref(), Some("c"));
        assert_eq!(updated.source.as_deref(), Some("Wire"));
    }

    #[test]
    fn test_update_missing_article() {
        let db = create_test_db();
        let err = articles::update_article(&db, 999, UpdateArticle::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn test_update_rejects_blank_required_field() {
        let db = create_test_db();
        let created = articles::create_article(&db, article("Blank"), None).unwrap();
        let err = articles::update_article(
            &db,
            created.id,
            UpdateArticle {
                title: Some(" ".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::MissingField(ref f) if f == &["title"]));
    }

    #[test]
    fn test_find_by_slug_counts_views() {
        let db = create_test_db();
        let created = articles::create_article(&db, article("Read Me"), None).unwrap();

        let first = articles::find_by_slug(&db, "read-me").unwrap().unwrap();
        assert_eq!(first.id, created.id);
        assert_eq!(first.views, 1);

        let second = articles::find_by_slug(&db, "read-me").unwrap().unwrap();
        assert_eq!(second.views, 2);

        let stored = articles::get_by_id(&db, created.id).unwrap().unwrap();
        assert_eq!(stored.views, 2);
    }

    #[test]
    fn test_find_by_slug_missing_is_none() {
        let db = create_test_db();
        assert!(articles::find_by_slug(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_archive_keeps_slug_reserved() {
        let db = create_test_db();
        let created = articles::create_article(&db, article("Retired Story"), None).unwrap();

        assert!(articles::archive_article(&db, created.id).unwrap());
        assert!(!articles::archive_article(&db, 999).unwrap());

        let archived = articles::get_by_id(&db, created.id).unwrap().unwrap();
        assert_eq!(archived.status, ArticleStatus::Archived);

        let replacement = articles::create_article(&db, article("Retired Story"), None).unwrap();
        assert_eq!(replacement.slug, "retired-story-1");
    }

    #[test]
    fn test_list_filters_and_counts() {
        let db = create_test_db();
        articles::create_article(&db, article("Politics one"), None).unwrap();
        let mut sports = article("Sports one");
        sports.category = "Sports".to_string();
        articles::create_article(&db, sports, None).unwrap();
        let mut draft = article("Draft one");
        draft.status = Some(ArticleStatus::Draft);
        articles::create_article(&db, draft, None).unwrap();

        let all = articles::list_articles(&db, &ArticleFilter::default(), 10, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "Draft one");

        let published = ArticleFilter {
            status: Some(ArticleStatus::Published),
            ..Default::default()
        };
        assert_eq!(articles::count_articles(&db, &published).unwrap(), 2);

        let politics = ArticleFilter {
            category: Some("Politics".to_string()),
            status: Some(ArticleStatus::Published),
        };
        let items = articles::list_articles(&db, &politics, 10, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Politics one");

        let page_two = articles::list_articles(&db, &ArticleFilter::default(), 2, 2).unwrap();
        assert_eq!(page_two.len(), 1);
    }

    #[test]
    fn test_featured_and_search() {
        let db = create_test_db();
        let mut lead = article("Budget approved");
        lead.featured = true;
        lead.tags = Some("economy,congress".to_string());
        articles::create_article(&db, lead, None).unwrap();
        articles::create_article(&db, article("Weather report"), None).unwrap();
        let mut hidden = article("Budget draft");
        hidden.featured = true;
        hidden.status = Some(ArticleStatus::Draft);
        articles::create_article(&db, hidden, None).unwrap();

        let featured = articles::featured_articles(&db, 10).unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].slug, "budget-approved");

        let found = articles::search_articles(&db, "budget", 10).unwrap();
        assert_eq!(found.len(), 1);
        let by_tag = articles::search_articles(&db, "congress", 10).unwrap();
        assert_eq!(by_tag.len(), 1);
        assert!(articles::search_articles(&db, "   ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_count_by_category() {
        let db = create_test_db();
        articles::create_article(&db, article("P1"), None).unwrap();
        articles::create_article(&db, article("P2"), None).unwrap();
        let mut s = article("S1");
        s.category = "Sports".to_string();
        articles::create_article(&db, s, None).unwrap();

        let counts = articles::count_by_category(&db).unwrap();
        assert_eq!(counts[0].category, "Politics");
        assert_eq!(counts[0].total, 2);
        assert_eq!(counts[1].category, "Sports");
        assert_eq!(counts[1].total, 1);
    }

    #[test]
    fn test_concurrent_creates_never_share_a_slug() {
        let path = std::env::temp_dir().join(format!("{}.db", unique_name("newsdesk_concurrency")));
        let path_str = path.to_string_lossy().to_string();
        let db = Database::open(&path_str).unwrap();
        db.migrate().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    (0..5)
                        .map(|_| {
                            articles::create_article(&db, article("Same Headline"), None)
                                .unwrap()
                                .slug
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut slugs: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), 20);
        assert!(slugs.contains(&"same-headline".to_string()));

        db.close();
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path_str, suffix));
        }
    }
}

mod category_integration_tests {
    use super::*;

    #[test]
    fn test_default_categories_are_seeded_in_order() {
        let db = create_test_db();
        let items = categories::list_categories(&db).unwrap();
        let names: Vec<&str> = items.iter().map(|c| c.category.name.as_str()).collect();
        assert_eq!(
            names,
            ["Politics", "Economy", "Sports", "Culture", "Technology", "Health"]
        );
    }

    #[test]
    fn test_counts_only_published_articles() {
        let db = create_test_db();
        articles::create_article(&db, article("Counted"), None).unwrap();
        let mut draft = article("Not counted");
        draft.status = Some(ArticleStatus::Draft);
        articles::create_article(&db, draft, None).unwrap();

        let items = categories::list_categories(&db).unwrap();
        let politics = items.iter().find(|c| c.category.name == "Politics").unwrap();
        assert_eq!(politics.total_articles, 1);
    }

    #[test]
    fn test_lookup_by_name_ignores_case() {
        let db = create_test_db();
        let category = categories::get_category_by_name(&db, "sports").unwrap().unwrap();
        assert_eq!(category.name, "Sports");
        assert!(categories::get_category_by_name(&db, "Astrology").unwrap().is_none());
    }
}

mod auth_integration_tests {
    use super::*;

    #[test]
    fn test_create_and_authenticate_user() {
        let db = create_test_db();

        let user = auth::create_user(&db, &new_user("Ana Lima", "ana@example.com", UserRole::Admin))
            .expect("Failed to create user");
        assert!(user.id > 0);
        assert!(user.last_login.is_none());

        let signed_in = auth::authenticate(&db, "ana@example.com", TEST_PASSWORD)
            .expect("Authentication error")
            .expect("User should be found");
        assert_eq!(signed_in.name, "Ana Lima");
        assert_eq!(signed_in.role, UserRole::Admin);

        let stored = auth::get_user(&db, user.id).unwrap().unwrap();
        assert!(stored.last_login.is_some());
    }

    #[test]
    fn test_authenticate_email_is_case_insensitive() {
        let db = create_test_db();
        auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin)).unwrap();
        assert!(auth::authenticate(&db, "ANA@Example.com", TEST_PASSWORD)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_authenticate_wrong_password_or_unknown_user() {
        let db = create_test_db();
        auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin)).unwrap();

        assert!(auth::authenticate(&db, "ana@example.com", "WrongPass456")
            .unwrap()
            .is_none());
        assert!(auth::authenticate(&db, "nobody@example.com", TEST_PASSWORD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_inactive_user_cannot_sign_in() {
        let db = create_test_db();
        let user =
            auth::create_user(&db, &new_user("Rui", "rui@example.com", UserRole::Journalist))
                .unwrap();
        let token = auth::create_session(&db, user.id, 8).unwrap();

        let toggled = auth::toggle_user_status(&db, user.id).unwrap().unwrap();
        assert_eq!(toggled.status, UserStatus::Inactive);

        assert!(auth::authenticate(&db, "rui@example.com", TEST_PASSWORD)
            .unwrap()
            .is_none());
        assert!(auth::validate_session(&db, &token).unwrap().is_none());

        let back = auth::toggle_user_status(&db, user.id).unwrap().unwrap();
        assert_eq!(back.status, UserStatus::Active);
    }

    #[test]
    fn test_duplicate_email_is_a_validation_error() {
        let db = create_test_db();
        auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin)).unwrap();
        let err = auth::create_user(&db, &new_user("Other", "ana@example.com", UserRole::Admin))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_update_user() {
        let db = create_test_db();
        let user =
            auth::create_user(&db, &new_user("Rui", "old@example.com", UserRole::Journalist))
                .unwrap();

        let updated = auth::update_user(
            &db,
            user.id,
            &UpdateUser {
                email: Some("new@example.com".to_string()),
                role: Some(UserRole::Admin),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.role, UserRole::Admin);
        assert_eq!(updated.name, "Rui");

        let missing = auth::update_user(&db, 999, &UpdateUser::default()).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_delete_user_cascades_sessions() {
        let db = create_test_db();
        let user = auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin))
            .unwrap();
        let token = auth::create_session(&db, user.id, 8).unwrap();

        assert!(auth::delete_user(&db, user.id).unwrap());
        assert!(!auth::delete_user(&db, user.id).unwrap());
        assert!(auth::get_user(&db, user.id).unwrap().is_none());
        assert!(auth::validate_session(&db, &token).unwrap().is_none());
    }

    #[test]
    fn test_session_lifecycle() {
        let db = create_test_db();
        let user = auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin))
            .unwrap();

        let token = auth::create_session(&db, user.id, 8).expect("Failed to create session");
        assert!(!token.is_empty());

        let session_user = auth::validate_session(&db, &token)
            .expect("Session validation failed")
            .expect("Session should be valid");
        assert_eq!(session_user.id, user.id);

        auth::delete_session(&db, &token).expect("Failed to delete session");
        assert!(auth::validate_session(&db, &token).unwrap().is_none());
    }

    #[test]
    fn test_expired_sessions_are_rejected_and_cleaned() {
        let db = create_test_db();
        let user = auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin))
            .unwrap();
        let token = auth::create_session(&db, user.id, -1).unwrap();

        assert!(auth::validate_session(&db, &token).unwrap().is_none());
        assert_eq!(auth::cleanup_expired_sessions(&db).unwrap(), 1);
    }

    #[test]
    fn test_update_password() {
        let db = create_test_db();
        auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin)).unwrap();

        auth::update_password(&db, "ana@example.com", NEW_PASSWORD).unwrap();

        assert!(auth::authenticate(&db, "ana@example.com", TEST_PASSWORD)
            .unwrap()
            .is_none());
        assert!(auth::authenticate(&db, "ana@example.com", NEW_PASSWORD)
            .unwrap()
            .is_some());
        assert!(auth::update_password(&db, "nobody@example.com", NEW_PASSWORD).is_err());
    }

    #[test]
    fn test_has_users() {
        let db = create_test_db();
        assert!(!auth::has_users(&db).unwrap());
        auth::create_user(&db, &new_user("Ana", "ana@example.com", UserRole::Admin)).unwrap();
        assert!(auth::has_users(&db).unwrap());
    }
}

mod newsletter_integration_tests {
    use super::*;

    fn code_of(outcome: Subscription) -> String {
        match outcome {
            Subscription::Pending(s) | Subscription::Reactivated(s) => {
                s.confirmation_code.expect("code issued")
            }
            Subscription::AlreadySubscribed => panic!("expected a confirmation code"),
        }
    }

    #[test]
    fn test_subscribe_confirm_unsubscribe_resubscribe() {
        let db = create_test_db();

        let outcome = newsletter::subscribe(&db, "Reader@Example.com", Some("Reader")).unwrap();
        assert!(matches!(outcome, Subscription::Pending(_)));
        let code = code_of(outcome);

        let confirmed = newsletter::confirm(&db, &code).unwrap().unwrap();
        assert!(confirmed.confirmed);
        assert_eq!(confirmed.email, "reader@example.com");
        assert!(newsletter::confirm(&db, &code).unwrap().is_none());

        assert!(matches!(
            newsletter::subscribe(&db, "reader@example.com", None).unwrap(),
            Subscription::AlreadySubscribed
        ));

        assert!(newsletter::unsubscribe(&db, "reader@example.com").unwrap());
        assert!(!newsletter::unsubscribe(&db, "reader@example.com").unwrap());

        let outcome = newsletter::subscribe(&db, "reader@example.com", None).unwrap();
        let Subscription::Reactivated(sub) = outcome else {
            panic!("expected reactivation");
        };
        assert!(!sub.confirmed);
        assert_eq!(sub.status, SubscriberStatus::Active);
        assert_eq!(sub.name.as_deref(), Some("Reader"));
    }

    #[test]
    fn test_resubscribing_unconfirmed_issues_new_code() {
        let db = create_test_db();
        let first = code_of(newsletter::subscribe(&db, "a@example.com", None).unwrap());
        let second = code_of(newsletter::subscribe(&db, "a@example.com", None).unwrap());
        assert_ne!(first, second);
        assert!(newsletter::confirm(&db, &first).unwrap().is_none());
        assert!(newsletter::confirm(&db, &second).unwrap().is_some());
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let db = create_test_db();
        let err = newsletter::subscribe(&db, "not-an-email", None).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let err = newsletter::subscribe(&db, "  ", None).unwrap_err();
        assert!(matches!(err, StoreError::MissingField(_)));
    }

    #[test]
    fn test_list_filters() {
        let db = create_test_db();
        let code = code_of(newsletter::subscribe(&db, "one@example.com", Some("One")).unwrap());
        newsletter::confirm(&db, &code).unwrap();
        newsletter::subscribe(&db, "two@example.com", Some("Two")).unwrap();
        newsletter::subscribe(&db, "three@example.com", None).unwrap();
        newsletter::unsubscribe(&db, "three@example.com").unwrap();

        let all = SubscriberFilter::default();
        assert_eq!(newsletter::count_subscribers(&db, &all).unwrap(), 3);

        let confirmed = SubscriberFilter {
            confirmed: Some(true),
            ..Default::default()
        };
        let items = newsletter::list_subscribers(&db, &confirmed, 10, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].email, "one@example.com");

        let cancelled = SubscriberFilter {
            status: Some(SubscriberStatus::Cancelled),
            ..Default::default()
        };
        assert_eq!(newsletter::count_subscribers(&db, &cancelled).unwrap(), 1);

        let search = SubscriberFilter {
            q: Some("two".to_string()),
            ..Default::default()
        };
        let items = newsletter::list_subscribers(&db, &search, 10, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].email, "two@example.com");
    }
}

mod health_integration_tests {
    use super::*;

    #[test]
    fn test_reports_unique_slug_after_migration() {
        let db = create_test_db();
        articles::create_article(&db, article("Counted"), None).unwrap();

        let report = health::schema_health(&db).unwrap();
        assert!(report.is_healthy());
        assert!(report.slug_column_exists);
        assert!(report.slug_unique_constraint);

        let articles_row = report.tables.iter().find(|t| t.name == "articles").unwrap();
        assert_eq!(articles_row.row_count, 1);
        let categories_row = report.tables.iter().find(|t| t.name == "categories").unwrap();
        assert_eq!(categories_row.row_count, 6);
    }

    #[test]
    fn test_reports_legacy_table_as_unhealthy() {
        let db = create_legacy_db(LEGACY_ARTICLES, "");
        let report = health::schema_health(&db).unwrap();
        assert!(!report.is_healthy());
        assert!(!report.slug_column_exists);
        assert_eq!(report.slug_state, SlugColumnState::Absent);
    }
}

mod backup_integration_tests {
    use super::*;
    use newsdesk::db::backup;
    use std::path::{Path, PathBuf};

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(unique_name("newsdesk_backup"));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn open_file_db(path: &Path) -> Database {
        let db = Database::open(&path.to_string_lossy()).unwrap();
        db.migrate().unwrap();
        db
    }

    fn write_legacy_file(path: &Path, ddl: &str, rows: &str) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(ddl).unwrap();
        conn.execute_batch(rows).unwrap();
    }

    #[test]
    fn test_export_then_import_restores_content() {
        let tmp = TempDir::new();
        let live = tmp.path("live.db");
        let exported = tmp.path("backups/snapshot.db");

        let db = open_file_db(&live);
        articles::create_article(&db, article("Kept Story"), None).unwrap();
        backup::export(&db, &exported).unwrap();
        assert!(backup::export(&db, &exported).is_err());
        articles::create_article(&db, article("Written After Export"), None).unwrap();
        db.close();

        let report = backup::import(&exported, &live, &tmp.path("backups")).unwrap();
        assert_eq!(report.articles, 1);
        assert!(report.migration.is_noop());
        let previous = report.previous.expect("replaced database is saved");
        assert!(previous.exists());

        let db = Database::open(&live.to_string_lossy()).unwrap();
        let items = articles::list_articles(&db, &ArticleFilter::default(), 10, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "kept-story");
        db.close();

        let saved = Database::open(&previous.to_string_lossy()).unwrap();
        assert_eq!(
            articles::count_articles(&saved, &ArticleFilter::default()).unwrap(),
            2
        );
        saved.close();
    }

    #[test]
    fn test_import_migrates_legacy_database() {
        let tmp = TempDir::new();
        let legacy = tmp.path("legacy.sqlite");
        write_legacy_file(
            &legacy,
            LEGACY_ARTICLES,
            r#"
            INSERT INTO articles (title, body, category, author) VALUES
                ('Old News', 'x', 'Politics', 'Ana'),
                ('Old News', 'y', 'Politics', 'Ana');
            "#,
        );
        let live = tmp.path("data/newsdesk.db");

        let report = backup::import(&legacy, &live, &tmp.path("backups")).unwrap();
        assert!(report.previous.is_none());
        assert_eq!(report.migration.initial_state, SlugColumnState::Absent);
        assert!(report.migration.rebuilt);
        assert_eq!(report.articles, 2);

        let db = Database::open(&live.to_string_lossy()).unwrap();
        {
            let conn = db.get().unwrap();
            assert_eq!(
                schema::slug_column_state(&conn).unwrap(),
                SlugColumnState::Unique
            );
        }
        assert_eq!(
            all_slugs(&db),
            vec![Some("old-news".to_string()), Some("old-news-1".to_string())]
        );
        db.close();
    }

    #[test]
    fn test_failed_import_leaves_live_database_alone() {
        let tmp = TempDir::new();
        let live = tmp.path("live.db");
        let db = open_file_db(&live);
        articles::create_article(&db, article("Still Here"), None).unwrap();
        db.close();

        let ddl = LEGACY_ARTICLES.replace(
            "updated_at TEXT DEFAULT CURRENT_TIMESTAMP",
            "updated_at TEXT DEFAULT CURRENT_TIMESTAMP,\n    legacy_notes TEXT",
        );
        let broken = tmp.path("broken.db");
        write_legacy_file(
            &broken,
            &ddl,
            "INSERT INTO articles (title, body, category, author) VALUES ('Lost', 'x', 'Politics', 'Ana');",
        );

        assert!(backup::import(&broken, &live, &tmp.path("backups")).is_err());
        assert!(!live.with_extension("importing").exists());

        let db = Database::open(&live.to_string_lossy()).unwrap();
        let items = articles::list_articles(&db, &ArticleFilter::default(), 10, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "still-here");
        db.close();
    }

    #[test]
    fn test_import_rejects_non_sqlite_files() {
        let tmp = TempDir::new();
        let junk = tmp.path("junk.db");
        std::fs::write(&junk, "not a database, just text\n".repeat(200)).unwrap();

        let err = backup::import(&junk, &tmp.path("live.db"), &tmp.path("backups")).unwrap_err();
        assert!(err.to_string().contains("not a SQLite database"));
        assert!(!tmp.path("live.db").exists());
    }
}
