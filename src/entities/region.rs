use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "region")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movie_region::Entity")]
    MovieRegion,
}

impl Related<super::movie::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_region::Relation::Movie.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_region::Relation::Region.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
