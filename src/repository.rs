use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait, sea_query::OnConflict,
};
use tracing::debug;

use crate::{
    entities::{
        actor, director, genre, movie, movie_actor, movie_director, movie_genre, movie_region,
        region,
    },
    error::PersistError,
    models::{EntityKind, EntityNames, MovieRecord},
};

/// Where the orchestrator hands validated, normalized records.
pub trait MovieStore {
    fn persist(
        &self,
        record: &MovieRecord,
        names: &EntityNames,
    ) -> impl std::future::Future<Output = Result<i32, PersistError>>;
}

#[derive(Clone)]
pub struct MovieRepository {
    db: DatabaseConnection,
}

impl MovieRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn ensure_schema(&self) -> Result<(), DbErr> {
        crate::db::ensure_schema(&self.db).await
    }

    pub async fn schema_ready(&self) -> Result<bool, DbErr> {
        crate::db::schema_ready(&self.db).await
    }

    /// Upserts the movie, its entities and its relations in one transaction.
    pub async fn persist_movie(&self, record: &MovieRecord, names: &EntityNames) -> Result<i32, DbErr> {
        let txn = self.db.begin().await?;

        let movie_id = upsert_movie(&txn, record).await?;
        for kind in EntityKind::ALL {
            let kind_names = names.get(kind);
            let keys = upsert_entities(&txn, kind, kind_names).await?;
            let entity_ids: Vec<i32> =
                kind_names.iter().filter_map(|name| keys.get(name).copied()).collect();
            replace_relations(&txn, movie_id, kind, &entity_ids).await?;
        }

        txn.commit().await?;

        debug!(external_id = %record.external_id, movie_id = movie_id, "persisted movie");
        Ok(movie_id)
    }
}

impl MovieStore for MovieRepository {
    async fn persist(&self, record: &MovieRecord, names: &EntityNames) -> Result<i32, PersistError> {
        self.persist_movie(record, names)
            .await
            .map_err(|source| PersistError { external_id: record.external_id.clone(), source })
    }
}

/// Inserts the movie or, when its external id is already stored, updates
/// every other column in place. Returns the movie's surrogate key.
pub async fn upsert_movie<C: ConnectionTrait>(conn: &C, record: &MovieRecord) -> Result<i32, DbErr> {
    let model = movie::ActiveModel {
        id: Default::default(),
        external_id: Set(record.external_id.clone()),
        rank: Set(i32::from(record.rank)),
        title: Set(record.title.clone()),
        original_title: Set(record.original_title.clone()),
        year: Set(record.year.map(i32::from)),
        rating_tenths: Set(i32::from(record.rating.tenths())),
        review_count: Set(i64::from(record.review_count)),
        quote: Set(record.quote.clone()),
        detail_url: Set(record.detail_url.clone()),
        poster_url: Set(record.poster_url.clone()),
        updated_at: Set(jiff::Timestamp::now().as_second()),
    };

    movie::Entity::insert(model)
        .on_conflict(
            OnConflict::column(movie::Column::ExternalId)
                .update_columns([
                    movie::Column::Rank,
                    movie::Column::Title,
                    movie::Column::OriginalTitle,
                    movie::Column::Year,
                    movie::Column::RatingTenths,
                    movie::Column::ReviewCount,
                    movie::Column::Quote,
                    movie::Column::DetailUrl,
                    movie::Column::PosterUrl,
                    movie::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    // The conflict path does not report a usable last insert id on SQLite.
    movie::Entity::find()
        .filter(movie::Column::ExternalId.eq(record.external_id.as_str()))
        .one(conn)
        .await?
        .map(|m| m.id)
        .ok_or_else(|| DbErr::RecordNotFound(format!("movie {}", record.external_id)))
}

macro_rules! upsert_names {
    ($lookup:ident, $conn:expr, $names:expr) => {{
        let models = $names
            .iter()
            .map(|name| $lookup::ActiveModel { id: Default::default(), name: Set(name.clone()) });
        $lookup::Entity::insert_many(models)
            .on_conflict(OnConflict::column($lookup::Column::Name).do_nothing().to_owned())
            .exec_without_returning($conn)
            .await?;

        $lookup::Entity::find()
            .filter($lookup::Column::Name.is_in($names.iter().map(String::as_str)))
            .all($conn)
            .await?
            .into_iter()
            .map(|m| (m.name, m.id))
            .collect::<HashMap<String, i32>>()
    }};
}

/// Inserts names not stored yet and returns the key of every given name.
pub async fn upsert_entities<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    names: &[String],
) -> Result<HashMap<String, i32>, DbErr> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }

    let keys = match kind {
        EntityKind::Region => upsert_names!(region, conn, names),
        EntityKind::Genre => upsert_names!(genre, conn, names),
        EntityKind::Director => upsert_names!(director, conn, names),
        EntityKind::Actor => upsert_names!(actor, conn, names),
    };
    Ok(keys)
}

macro_rules! replace_links {
    ($link:ident, $entity_col:ident, $conn:expr, $movie_id:expr, $ids:expr) => {{
        $link::Entity::delete_many()
            .filter($link::Column::MovieId.eq($movie_id))
            .exec($conn)
            .await?;

        if !$ids.is_empty() {
            let models = $ids
                .iter()
                .map(|id| $link::ActiveModel { movie_id: Set($movie_id), $entity_col: Set(*id) });
            $link::Entity::insert_many(models).exec_without_returning($conn).await?;
        }
    }};
}

/// Makes the movie's edges of `kind` exactly `entity_ids`: stale edges go,
/// duplicates collapse.
pub async fn replace_relations<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    kind: EntityKind,
    entity_ids: &[i32],
) -> Result<(), DbErr> {
    let ids: BTreeSet<i32> = entity_ids.iter().copied().collect();

    match kind {
        EntityKind::Region => replace_links!(movie_region, region_id, conn, movie_id, ids),
        EntityKind::Genre => replace_links!(movie_genre, genre_id, conn, movie_id, ids),
        EntityKind::Director => replace_links!(movie_director, director_id, conn, movie_id, ids),
        EntityKind::Actor => replace_links!(movie_actor, actor_id, conn, movie_id, ids),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{ModelTrait, PaginatorTrait};

    use super::*;
    use crate::models::Rating;

    fn record(external_id: &str, rank: u16) -> MovieRecord {
        MovieRecord {
            external_id: external_id.to_string(),
            rank,
            title: "肖申克的救赎".to_string(),
            original_title: Some("The Shawshank Redemption".to_string()),
            year: Some(1994),
            rating: Rating::from_tenths(97).unwrap(),
            review_count: 3_012_450,
            quote: Some("希望让人自由。".to_string()),
            detail_url: format!("https://movie.douban.com/subject/{external_id}/"),
            poster_url: None,
        }
    }

    fn names(genres: &[&str]) -> EntityNames {
        EntityNames {
            region: vec!["美国".to_string()],
            genre: genres.iter().map(|g| g.to_string()).collect(),
            director: vec!["弗兰克·德拉邦特 Frank Darabont".to_string()],
            actor: vec!["蒂姆·罗宾斯 Tim Robbins".to_string(), "摩根·弗里曼 Morgan Freeman".to_string()],
        }
    }

    async fn repo() -> MovieRepository {
        MovieRepository::new(crate::db::memory().await)
    }

    async fn genres_of(repo: &MovieRepository, external_id: &str) -> Vec<String> {
        let movie = movie::Entity::find()
            .filter(movie::Column::ExternalId.eq(external_id))
            .one(repo.db())
            .await
            .unwrap()
            .unwrap();
        let mut names: Vec<String> = movie
            .find_related(genre::Entity)
            .all(repo.db())
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn upsert_movie_updates_in_place() {
        let repo = repo().await;
        let first = upsert_movie(repo.db(), &record("1292052", 1)).await.unwrap();

        let mut moved = record("1292052", 3);
        moved.rating = Rating::from_tenths(96).unwrap();
        moved.quote = None;
        let second = upsert_movie(repo.db(), &moved).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(movie::Entity::find().count(repo.db()).await.unwrap(), 1);

        let stored = movie::Entity::find_by_id(first).one(repo.db()).await.unwrap().unwrap();
        assert_eq!(stored.rank, 3);
        assert_eq!(stored.rating_tenths, 96);
        assert_eq!(stored.quote, None);
    }

    #[tokio::test]
    async fn upsert_entities_returns_keys_for_new_and_known_names() {
        let repo = repo().await;
        let first = upsert_entities(repo.db(), EntityKind::Genre, &["剧情".to_string()]).await.unwrap();
        let both = upsert_entities(repo.db(), EntityKind::Genre, &["剧情".to_string(), "犯罪".to_string()])
            .await
            .unwrap();

        assert_eq!(both.len(), 2);
        assert_eq!(both["剧情"], first["剧情"]);
        assert_eq!(genre::Entity::find().count(repo.db()).await.unwrap(), 2);
        assert!(upsert_entities(repo.db(), EntityKind::Actor, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn relations_are_replaced_not_accumulated() {
        let repo = repo().await;
        repo.persist_movie(&record("1292052", 1), &names(&["犯罪", "剧情"])).await.unwrap();
        repo.persist_movie(&record("1292052", 1), &names(&["剧情", "悬疑"])).await.unwrap();

        assert_eq!(genres_of(&repo, "1292052").await, vec!["剧情", "悬疑"]);
        // Entities outlive the edges that pointed at them.
        assert_eq!(genre::Entity::find().count(repo.db()).await.unwrap(), 3);
        assert_eq!(movie_genre::Entity::find().count(repo.db()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_entity_ids_collapse_to_one_edge() {
        let repo = repo().await;
        let movie_id = upsert_movie(repo.db(), &record("1292052", 1)).await.unwrap();
        let keys = upsert_entities(repo.db(), EntityKind::Region, &["美国".to_string()]).await.unwrap();
        let id = keys["美国"];

        replace_relations(repo.db(), movie_id, EntityKind::Region, &[id, id]).await.unwrap();
        assert_eq!(movie_region::Entity::find().count(repo.db()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rerun_leaves_row_counts_unchanged() {
        let repo = repo().await;
        for _ in 0..2 {
            repo.persist_movie(&record("1292052", 1), &names(&["犯罪", "剧情"])).await.unwrap();
            repo.persist_movie(&record("1291546", 2), &names(&["剧情", "爱情"])).await.unwrap();
        }

        let db = repo.db();
        assert_eq!(movie::Entity::find().count(db).await.unwrap(), 2);
        assert_eq!(genre::Entity::find().count(db).await.unwrap(), 3);
        assert_eq!(movie_genre::Entity::find().count(db).await.unwrap(), 4);
        assert_eq!(actor::Entity::find().count(db).await.unwrap(), 2);
        assert_eq!(movie_actor::Entity::find().count(db).await.unwrap(), 4);
        assert_eq!(director::Entity::find().count(db).await.unwrap(), 1);
        assert_eq!(movie_director::Entity::find().count(db).await.unwrap(), 2);
        assert_eq!(region::Entity::find().count(db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ensure_schema_keeps_existing_rows() {
        let repo = repo().await;
        repo.persist_movie(&record("1292052", 1), &names(&["剧情"])).await.unwrap();

        repo.ensure_schema().await.unwrap();

        assert_eq!(movie::Entity::find().count(repo.db()).await.unwrap(), 1);
        assert_eq!(genres_of(&repo, "1292052").await, vec!["剧情"]);
    }

    #[tokio::test]
    async fn store_errors_carry_the_external_id() {
        let db = crate::db::connect("sqlite::memory:").await.unwrap();
        let repo = MovieRepository::new(db);

        // No schema: the insert fails for this record only.
        let err = repo.persist(&record("1292052", 1), &names(&["剧情"])).await.unwrap_err();
        assert_eq!(err.external_id, "1292052");
        assert!(!err.is_connection_level());
    }
}
