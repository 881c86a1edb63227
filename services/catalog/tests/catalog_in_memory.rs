//! End-to-end use-case flows over the in-memory backend

use catalog::models::{CastMemberCreateCommand, CastMemberType, CategoryCreateCommand, Rating};
use catalog::use_cases::{CreateGenreInput, CreateVideoInput, UpdateCategoryInput};
use catalog::{Catalog, CatalogError, ErrorKind};
use serde_json::json;

fn category(name: &str) -> CategoryCreateCommand {
    CategoryCreateCommand {
        name: name.to_string(),
        ..Default::default()
    }
}

fn video(title: &str) -> CreateVideoInput {
    CreateVideoInput {
        title: title.to_string(),
        description: "description".to_string(),
        year_launched: 1999,
        duration: 136,
        rating: Rating::R16,
        is_opened: false,
        categories_id: vec![],
        genres_id: vec![],
        cast_members_id: vec![],
    }
}

#[tokio::test]
async fn test_search_pages_filtered_and_sorted_names() {
    let catalog = Catalog::in_memory();
    for name in ["a", "AAA", "AaA", "b", "c"] {
        catalog.categories.create(category(name)).await.unwrap();
    }

    let first = catalog
        .categories
        .list(&json!({ "page": 1, "per_page": 2, "sort": "name", "filter": { "name": "a" } }))
        .await
        .unwrap();
    let names: Vec<&str> = first.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["AAA", "AaA"]);
    assert_eq!((first.total, first.last_page), (3, 2));

    let second = catalog
        .categories
        .list(&json!({ "page": "2", "per_page": 2, "sort": "name", "filter": { "name": "a" } }))
        .await
        .unwrap();
    let names: Vec<&str> = second.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["a"]);
    assert_eq!(second.current_page, 2);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let catalog = Catalog::in_memory();
    catalog.categories.create(category("Movie")).await.unwrap();

    let output = catalog
        .categories
        .list(&json!({ "page": 9, "per_page": 15 }))
        .await
        .unwrap();
    assert!(output.items.is_empty());
    assert_eq!((output.total, output.last_page), (1, 1));
}

#[tokio::test]
async fn test_empty_catalog_has_one_page() {
    let catalog = Catalog::in_memory();
    let output = catalog.videos.list(&json!({})).await.unwrap();
    assert!(output.items.is_empty());
    assert_eq!(
        (output.total, output.current_page, output.per_page, output.last_page),
        (0, 1, 15, 1)
    );
}

#[tokio::test]
async fn test_video_referencing_missing_category_and_genre() {
    let catalog = Catalog::in_memory();
    let missing_category = "8f1d6c1c-0d51-4b6e-8a62-8e4a5c1c0b11";
    let missing_genre = "4a3b0a2e-9d4f-4c3e-b7b2-1f0e6d5c4b3a";

    let error = catalog
        .videos
        .create(CreateVideoInput {
            categories_id: vec![missing_category.to_string()],
            genres_id: vec![missing_genre.to_string()],
            ..video("Matrix")
        })
        .await
        .unwrap_err();

    let CatalogError::Validation(validation) = &error else {
        panic!("expected a validation error, got {error:?}");
    };
    assert_eq!(validation.errors.len(), 2);
    assert_eq!(
        validation.field("categories_id"),
        Some(&[format!("Category Not Found using ID {missing_category}")][..])
    );
    assert_eq!(
        validation.field("genres_id"),
        Some(&[format!("Genre Not Found using ID {missing_genre}")][..])
    );

    let videos = catalog.videos.list(&json!({})).await.unwrap();
    assert_eq!(videos.total, 0);
}

#[tokio::test]
async fn test_video_with_every_relation() {
    let catalog = Catalog::in_memory();
    let movie = catalog.categories.create(category("Movie")).await.unwrap();
    let action = catalog
        .genres
        .create(CreateGenreInput {
            name: "Action".to_string(),
            categories_id: vec![movie.id.clone()],
            is_active: None,
        })
        .await
        .unwrap();
    let keanu = catalog
        .cast_members
        .create(CastMemberCreateCommand {
            name: "Keanu".to_string(),
            cast_member_type: CastMemberType::Actor,
        })
        .await
        .unwrap();

    let created = catalog
        .videos
        .create(CreateVideoInput {
            categories_id: vec![movie.id.clone(), movie.id.clone()],
            genres_id: vec![action.id.clone()],
            cast_members_id: vec![keanu.id.clone()],
            ..video("Matrix")
        })
        .await
        .unwrap();
    assert_eq!(created.categories_id, vec![movie.id.clone()]);

    let by_cast_member = catalog
        .videos
        .list(&json!({ "filter": { "cast_members_id": [keanu.id] } }))
        .await
        .unwrap();
    assert_eq!(by_cast_member.total, 1);
    assert_eq!(by_cast_member.items[0].id, created.id);

    let json = serde_json::to_value(&by_cast_member.items[0]).unwrap();
    assert_eq!(json["rating"], json!("16"));
    assert_eq!(json["trailer"], json!(null));
}

#[tokio::test]
async fn test_update_never_inserted_category() {
    let catalog = Catalog::in_memory();
    let error = catalog
        .categories
        .update(UpdateCategoryInput {
            id: "9366b7dc-2d71-4799-b91c-c64adb205104".to_string(),
            name: Some("Movie".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(
        error.to_string(),
        "Category Not Found using ID 9366b7dc-2d71-4799-b91c-c64adb205104"
    );
    let categories = catalog.categories.list(&json!({})).await.unwrap();
    assert_eq!(categories.total, 0);
}

#[tokio::test]
async fn test_invalid_cast_member_type_filter() {
    let catalog = Catalog::in_memory();
    let error = catalog
        .cast_members
        .list(&json!({ "filter": { "type": 3 } }))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_deleting_related_aggregates_detaches_them() {
    let catalog = Catalog::in_memory();
    let movie = catalog.categories.create(category("Movie")).await.unwrap();
    let action = catalog
        .genres
        .create(CreateGenreInput {
            name: "Action".to_string(),
            categories_id: vec![movie.id.clone()],
            is_active: None,
        })
        .await
        .unwrap();
    let keanu = catalog
        .cast_members
        .create(CastMemberCreateCommand {
            name: "Keanu".to_string(),
            cast_member_type: CastMemberType::Actor,
        })
        .await
        .unwrap();
    let matrix = catalog
        .videos
        .create(CreateVideoInput {
            categories_id: vec![movie.id.clone()],
            genres_id: vec![action.id.clone()],
            cast_members_id: vec![keanu.id.clone()],
            ..video("Matrix")
        })
        .await
        .unwrap();

    catalog.categories.delete(&movie.id).await.unwrap();

    let genre = catalog.genres.get(&action.id).await.unwrap();
    assert!(genre.categories_id.is_empty());
    let genres = catalog
        .genres
        .list(&json!({ "filter": { "categories_id": [movie.id] } }))
        .await
        .unwrap();
    assert_eq!(genres.total, 0);

    let stored = catalog.videos.get(&matrix.id).await.unwrap();
    assert!(stored.categories_id.is_empty());
    assert_eq!(stored.genres_id, vec![action.id.clone()]);
    let videos = catalog
        .videos
        .list(&json!({ "filter": { "categories_id": [movie.id] } }))
        .await
        .unwrap();
    assert_eq!(videos.total, 0);

    catalog.genres.delete(&action.id).await.unwrap();
    catalog.cast_members.delete(&keanu.id).await.unwrap();

    let stored = catalog.videos.get(&matrix.id).await.unwrap();
    assert!(stored.genres_id.is_empty());
    assert!(stored.cast_members_id.is_empty());
    let videos = catalog
        .videos
        .list(&json!({ "filter": { "cast_members_id": [keanu.id] } }))
        .await
        .unwrap();
    assert_eq!(videos.total, 0);
}
