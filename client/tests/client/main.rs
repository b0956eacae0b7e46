mod batch;
mod list;
mod mutation;
mod session;
mod windowed;

use client::models::Project;
use client::{Entity, use_entity_list};
use test_helpers::spawn_app;

#[tokio::test]
async fn projects_are_listed_anonymously() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let projects = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    let page = projects.fetch().await?;

    assert_eq!(page.count, 2);
    assert_eq!(page.results[0].name, "Vermont Atlas of Life");
    assert!(!projects.state().is_loading);

    Ok(())
}
