use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(string_uniq(Movie::ExternalId))
                    .col(integer(Movie::Rank))
                    .col(string(Movie::Title))
                    .col(string_null(Movie::OriginalTitle))
                    .col(integer_null(Movie::Year))
                    .col(integer(Movie::RatingTenths))
                    .col(big_integer(Movie::ReviewCount))
                    .col(text_null(Movie::Quote))
                    .col(string(Movie::DetailUrl))
                    .col(string_null(Movie::PosterUrl))
                    .col(big_integer(Movie::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    ExternalId,
    Rank,
    Title,
    OriginalTitle,
    Year,
    RatingTenths,
    ReviewCount,
    Quote,
    DetailUrl,
    PosterUrl,
    UpdatedAt,
}
