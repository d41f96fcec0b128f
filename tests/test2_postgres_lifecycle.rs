#![cfg(feature = "test-utils-postgres")]

use sql_caddy::prelude::*;
use sql_caddy::test_utils::EmbeddedPostgres;

async fn exists(locator: &DatabaseLocator) -> Result<bool, SqlCaddyError> {
    let by_catalog = database_exists(locator, false).await?;
    let by_select = database_exists(locator, true).await?;
    assert_eq!(by_catalog, by_select, "existence modes disagree for {locator}");
    Ok(by_catalog)
}

#[test]
fn test2_postgres_create_and_drop() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pg = EmbeddedPostgres::start().await?;
        let target = pg.locator_for("sqlcaddy_testonly");

        drop_database(&target).await?;
        assert!(!drop_database(&target).await?);
        assert!(!exists(&target).await?);
        assert!(create_database(&target, None, false).await?);
        assert!(exists(&target).await?);
        assert!(!create_database(&target, None, false).await?);

        assert!(create_database(&target, Some("template1"), true).await?);
        assert!(exists(&target).await?);
        assert!(drop_database(&target).await?);
        assert!(!exists(&target).await?);

        pg.stop().await;
        Ok::<(), SqlCaddyError>(())
    })?;
    Ok(())
}

#[test]
fn test2_postgres_awkward_names() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pg = EmbeddedPostgres::start().await?;
        let target = pg.locator_for("odd \"quoted\" Name");

        assert!(create_database(&target, None, false).await?);
        assert!(exists(&target).await?);
        // catalog lookups are case sensitive
        assert!(!database_exists(&pg.locator_for("odd \"quoted\" name"), false).await?);
        assert!(drop_database(&target).await?);
        assert!(!exists(&target).await?);

        pg.stop().await;
        Ok::<(), SqlCaddyError>(())
    })?;
    Ok(())
}

#[test]
fn test2_postgres_drop_with_open_sessions() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pg = EmbeddedPostgres::start().await?;
        let target = pg.locator_for("sqlcaddy_busy");
        assert!(create_database(&target, None, true).await?);

        let engine = Engine::new(&target).await?;
        let mut session = Session::from_engine(&engine).await?;
        session
            .as_connection()?
            .execute_batch("create table t (x int); insert into t values (1);")
            .await?;

        // the open transaction would normally block DROP DATABASE
        assert!(drop_database(&target).await?);
        assert!(!database_exists(&target, false).await?);
        assert!(session.commit().await.is_err());
        engine.dispose();

        pg.stop().await;
        Ok::<(), SqlCaddyError>(())
    })?;
    Ok(())
}

#[test]
fn test2_postgres_soft_reap_spares_idle_sessions() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pg = EmbeddedPostgres::start().await?;
        let target = pg.locator_for("sqlcaddy_reaped");
        assert!(create_database(&target, None, true).await?);
        let name = target.database().unwrap_or_default();

        let engine = Engine::new(&target).await?;
        let mut idle = engine.connect().await?;
        idle.execute_batch("select 1").await?;

        with_admin_connection(&target, async |admin| reap(admin, Some(name), false).await).await?;
        idle.execute_batch("select 1").await?;

        with_admin_connection(&target, async |admin| reap(admin, Some(name), true).await).await?;
        assert!(idle.execute_batch("select 1").await.is_err());
        drop(idle);
        engine.dispose();

        assert!(drop_database(&target).await?);
        pg.stop().await;
        Ok::<(), SqlCaddyError>(())
    })?;
    Ok(())
}

#[test]
fn test2_postgres_temporary_database_and_statements() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pg = EmbeddedPostgres::start().await?;
        let server = pg.locator();
        let parts = LocatorParts::default()
            .with_host(server.host().unwrap_or("localhost"))
            .with_port(server.port().unwrap_or(5432))
            .with_username(server.username().unwrap_or("postgres"))
            .with_password(server.password().unwrap_or_default());

        let temp = TemporaryDatabase::create_with(Dialect::Postgres, parts).await?;
        assert!(database_exists(temp.locator(), false).await?);

        let (name, elapsed) = with_session(temp.locator(), async |s| {
            assert_eq!(get_dbtype(s)?, Dialect::Postgres);
            execute_sql(
                s,
                "create table people (id int primary key, name text)",
                &NamedParams::new(),
                ExecOptions::default(),
            )
            .await?;
            execute_sql(
                s,
                "insert into people values (:id, :name)",
                &NamedParams::new().with("id", 1).with("name", "o'brien"),
                ExecOptions::default(),
            )
            .await?;
            assert!(table_exists(s, "people", None).await?);
            assert!(table_exists(s, "people", Some("public")).await?);

            let row = execute_fetchone(
                s,
                "select name, interval '1 day 02:00:00' as elapsed from people where id = :id",
                &NamedParams::new().with("id", 1),
                ExecOptions::default().quiet(true),
            )
            .await?
            .expect("one row");
            Ok((row.get("name").cloned(), row.get("elapsed").cloned()))
        })
        .await?;
        assert_eq!(name, Some(RowValues::Text("o'brien".into())));
        assert_eq!(
            elapsed,
            Some(RowValues::Interval(Interval::default().with_days(1).with_hours(2)))
        );

        let locator = temp.locator().clone();
        temp.cleanup().await?;
        assert!(!database_exists(&locator, false).await?);

        pg.stop().await;
        Ok::<(), SqlCaddyError>(())
    })?;
    Ok(())
}
