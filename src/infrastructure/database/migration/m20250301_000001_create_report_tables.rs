//! Initial migration to create the report tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create reports table
        manager
            .create_table(
                Table::create()
                    .table(Reports::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reports::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Reports::ReporterId).string().not_null())
                    .col(ColumnDef::new(Reports::ReportType).string().not_null())
                    .col(ColumnDef::new(Reports::Resolved).boolean().not_null().default(false))
                    .col(ColumnDef::new(Reports::Verified).boolean().not_null().default(false))
                    .col(ColumnDef::new(Reports::Name).string())
                    .col(ColumnDef::new(Reports::Breed).string())
                    .col(ColumnDef::new(Reports::Color).string())
                    .col(ColumnDef::new(Reports::Size).string())
                    .col(ColumnDef::new(Reports::Sex).string())
                    .col(ColumnDef::new(Reports::AgeGroup).string())
                    .col(ColumnDef::new(Reports::ChipNumber).string_len(15))
                    .col(ColumnDef::new(Reports::Location).string())
                    .col(ColumnDef::new(Reports::ExtraDetails).string())
                    .col(ColumnDef::new(Reports::ContactName).string())
                    .col(ColumnDef::new(Reports::ContactPhone).string())
                    .col(ColumnDef::new(Reports::ContactEmail).string())
                    .col(ColumnDef::new(Reports::ContactAddress).string())
                    .col(ColumnDef::new(Reports::EventDate).date())
                    .col(ColumnDef::new(Reports::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Reports::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Create report_images table, rows live and die with their report
        manager
            .create_table(
                Table::create()
                    .table(ReportImages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ReportImages::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(ReportImages::ReportId).integer().not_null())
                    .col(ColumnDef::new(ReportImages::Payload).text().not_null())
                    .col(ColumnDef::new(ReportImages::ContentType).string().not_null())
                    .col(ColumnDef::new(ReportImages::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ReportImages::Table, ReportImages::ReportId)
                            .to(Reports::Table, Reports::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create candidate_matches table. The endpoint columns carry no
        // foreign key constraint: edge lifetime is managed by the service
        // layer, which validates both endpoints on insert and removes
        // touching edges on resolve/delete.
        manager
            .create_table(
                Table::create()
                    .table(CandidateMatches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CandidateMatches::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(CandidateMatches::ReportId).integer().not_null())
                    .col(ColumnDef::new(CandidateMatches::CandidateId).integer().not_null())
                    .col(ColumnDef::new(CandidateMatches::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Create indices for better query performance
        manager
            .create_index(
                Index::create()
                    .name("idx_reports_reporter")
                    .table(Reports::Table)
                    .col(Reports::ReporterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reports_type_resolved")
                    .table(Reports::Table)
                    .col(Reports::ReportType)
                    .col(Reports::Resolved)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_report_images_report")
                    .table(ReportImages::Table)
                    .col(ReportImages::ReportId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_matches_report")
                    .table(CandidateMatches::Table)
                    .col(CandidateMatches::ReportId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_matches_candidate")
                    .table(CandidateMatches::Table)
                    .col(CandidateMatches::CandidateId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order of creation
        manager
            .drop_table(Table::drop().table(CandidateMatches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportImages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reports::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Reports {
    Table,
    Id,
    ReporterId,
    ReportType,
    Resolved,
    Verified,
    Name,
    Breed,
    Color,
    Size,
    Sex,
    AgeGroup,
    ChipNumber,
    Location,
    ExtraDetails,
    ContactName,
    ContactPhone,
    ContactEmail,
    ContactAddress,
    EventDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ReportImages {
    Table,
    Id,
    ReportId,
    Payload,
    ContentType,
    CreatedAt,
}

#[derive(Iden)]
enum CandidateMatches {
    Table,
    Id,
    ReportId,
    CandidateId,
    CreatedAt,
}
