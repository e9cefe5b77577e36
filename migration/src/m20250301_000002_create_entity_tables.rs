use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Lookup tables, one per kind of multi-valued attribute. Each gets a
/// `movie_<kind>` link table keyed by `(movie_id, <kind>_id)`.
const KINDS: [&str; 4] = ["region", "genre", "director", "actor"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for kind in KINDS {
            manager
                .create_table(
                    Table::create()
                        .table(Alias::new(kind))
                        .if_not_exists()
                        .col(pk_auto(Lookup::Id))
                        .col(string_uniq(Lookup::Name))
                        .to_owned(),
                )
                .await?;

            let link = format!("movie_{kind}");
            let entity_col = format!("{kind}_id");

            manager
                .create_table(
                    Table::create()
                        .table(Alias::new(&link))
                        .if_not_exists()
                        .col(integer(Link::MovieId))
                        .col(integer(Alias::new(&entity_col)))
                        .primary_key(
                            Index::create().col(Link::MovieId).col(Alias::new(&entity_col)),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk_{link}_movie"))
                                .from(Alias::new(&link), Link::MovieId)
                                .to(Movie::Table, Movie::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk_{link}_{kind}"))
                                .from(Alias::new(&link), Alias::new(&entity_col))
                                .to(Alias::new(kind), Lookup::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{link}_{kind}"))
                        .table(Alias::new(&link))
                        .col(Alias::new(&entity_col))
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for kind in KINDS.iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(format!("movie_{kind}"))).to_owned())
                .await?;
            manager.drop_table(Table::drop().table(Alias::new(*kind)).to_owned()).await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Lookup {
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Link {
    MovieId,
}
