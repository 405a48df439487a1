use std::pin::Pin;

use futures::{Stream, TryStreamExt};
use tonic::{Request, Response, Status};

use crate::api::handlers::{present, requested_release, MetadataService, RecordStream};
use crate::error::MetadataError;
use crate::proto::{
    self,
    ensembl_metadata_server::{EnsemblMetadata, EnsemblMetadataServer},
};
use crate::store::MetadataStore;

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

fn fault(method: &str, err: MetadataError) -> Status {
    log::warn!("{method} failed: {err}");
    err.into()
}

fn respond<T: Send + 'static>(method: &'static str, records: RecordStream<T>) -> ResponseStream<T> {
    Box::pin(records.map_err(move |err| fault(method, err)))
}

impl<S: MetadataStore> MetadataService<S> {
    pub fn into_server(self) -> EnsemblMetadataServer<Self> {
        EnsemblMetadataServer::new(self)
    }
}

#[tonic::async_trait]
impl<S: MetadataStore> EnsemblMetadata for MetadataService<S> {
    async fn get_genome_by_uuid(
        &self,
        request: Request<proto::GenomeUuidRequest>,
    ) -> Result<Response<proto::Genome>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetGenomeByUUID genome_uuid={:?} release_version={}",
            request.genome_uuid,
            request.release_version
        );

        let genome = self
            .genome_by_uuid(present(request.genome_uuid), requested_release(request.release_version))
            .await
            .map_err(|err| fault("GetGenomeByUUID", err))?;
        Ok(Response::new(genome))
    }

    async fn get_species_information(
        &self,
        request: Request<proto::GenomeUuidRequest>,
    ) -> Result<Response<proto::Species>, Status> {
        let request = request.into_inner();
        log::debug!("GetSpeciesInformation genome_uuid={:?}", request.genome_uuid);

        let species = self
            .species_information(present(request.genome_uuid))
            .await
            .map_err(|err| fault("GetSpeciesInformation", err))?;
        Ok(Response::new(species))
    }

    async fn get_assembly_information(
        &self,
        request: Request<proto::AssemblyIdRequest>,
    ) -> Result<Response<proto::AssemblyInfo>, Status> {
        let request = request.into_inner();
        log::debug!("GetAssemblyInformation assembly_uuid={:?}", request.assembly_uuid);

        let assembly = self
            .assembly_information(present(request.assembly_uuid))
            .await
            .map_err(|err| fault("GetAssemblyInformation", err))?;
        Ok(Response::new(assembly))
    }

    async fn get_sub_species_information(
        &self,
        request: Request<proto::OrganismIdRequest>,
    ) -> Result<Response<proto::SubSpecies>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetSubSpeciesInformation organism_uuid={:?} group={:?}",
            request.organism_uuid,
            request.group
        );

        let sub_species = self
            .sub_species_information(present(request.organism_uuid))
            .await
            .map_err(|err| fault("GetSubSpeciesInformation", err))?;
        Ok(Response::new(sub_species))
    }

    async fn get_grouping_information(
        &self,
        _request: Request<proto::OrganismIdRequest>,
    ) -> Result<Response<proto::Grouping>, Status> {
        Err(Status::unimplemented("GetGroupingInformation is not implemented"))
    }

    async fn get_karyotype_information(
        &self,
        request: Request<proto::GenomeUuidRequest>,
    ) -> Result<Response<proto::Karyotype>, Status> {
        let request = request.into_inner();
        log::debug!("GetKaryotypeInformation genome_uuid={:?}", request.genome_uuid);

        let karyotype = self
            .karyotype_information(present(request.genome_uuid))
            .await
            .map_err(|err| fault("GetKaryotypeInformation", err))?;
        Ok(Response::new(karyotype))
    }

    async fn get_top_level_statistics(
        &self,
        request: Request<proto::OrganismIdRequest>,
    ) -> Result<Response<proto::TopLevelStatistics>, Status> {
        let request = request.into_inner();
        log::debug!("GetTopLevelStatistics organism_uuid={:?}", request.organism_uuid);

        let statistics = self
            .top_level_statistics(present(request.organism_uuid))
            .await
            .map_err(|err| fault("GetTopLevelStatistics", err))?;
        Ok(Response::new(statistics))
    }

    async fn get_top_level_statistics_by_uuid(
        &self,
        request: Request<proto::GenomeUuidRequest>,
    ) -> Result<Response<proto::TopLevelStatisticsByUuid>, Status> {
        let request = request.into_inner();
        log::debug!("GetTopLevelStatisticsByUUID genome_uuid={:?}", request.genome_uuid);

        let statistics = self
            .top_level_statistics_by_uuid(present(request.genome_uuid))
            .await
            .map_err(|err| fault("GetTopLevelStatisticsByUUID", err))?;
        Ok(Response::new(statistics))
    }

    async fn get_genome_by_name(
        &self,
        request: Request<proto::GenomeNameRequest>,
    ) -> Result<Response<proto::Genome>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetGenomeByName ensembl_name={:?} site_name={:?} release_version={}",
            request.ensembl_name,
            request.site_name,
            request.release_version
        );

        let genome = self
            .genome_by_name(
                present(request.ensembl_name),
                present(request.site_name),
                requested_release(request.release_version),
            )
            .await
            .map_err(|err| fault("GetGenomeByName", err))?;
        Ok(Response::new(genome))
    }

    async fn get_genome_uuid(
        &self,
        request: Request<proto::GenomeInfoRequest>,
    ) -> Result<Response<proto::GenomeUuid>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetGenomeUUID ensembl_name={:?} assembly_name={:?}",
            request.ensembl_name,
            request.assembly_name
        );

        let genome_uuid = self
            .genome_uuid(present(request.ensembl_name), present(request.assembly_name))
            .await
            .map_err(|err| fault("GetGenomeUUID", err))?;
        Ok(Response::new(genome_uuid))
    }

    type GetGenomesByKeywordStream = ResponseStream<proto::Genome>;

    async fn get_genomes_by_keyword(
        &self,
        request: Request<proto::GenomeKeywordRequest>,
    ) -> Result<Response<Self::GetGenomesByKeywordStream>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetGenomesByKeyword keyword={:?} release_version={}",
            request.keyword,
            request.release_version
        );

        let genomes = self
            .genomes_by_keyword(present(request.keyword), requested_release(request.release_version))
            .await
            .map_err(|err| fault("GetGenomesByKeyword", err))?;
        Ok(Response::new(respond("GetGenomesByKeyword", genomes)))
    }

    type GetGenomesByAssemblyAccessionIDStream = ResponseStream<proto::Genome>;

    async fn get_genomes_by_assembly_accession_id(
        &self,
        request: Request<proto::AssemblyAccessionIdRequest>,
    ) -> Result<Response<Self::GetGenomesByAssemblyAccessionIDStream>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetGenomesByAssemblyAccessionID assembly_accession={:?} release_version={}",
            request.assembly_accession,
            request.release_version
        );

        let genomes = self.genomes_by_assembly_accession(
            present(request.assembly_accession),
            requested_release(request.release_version),
        );
        Ok(Response::new(respond("GetGenomesByAssemblyAccessionID", genomes)))
    }

    type GetReleaseStream = ResponseStream<proto::Release>;

    async fn get_release(
        &self,
        request: Request<proto::ReleaseRequest>,
    ) -> Result<Response<Self::GetReleaseStream>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetRelease site_name={:?} release_version={:?} current_only={}",
            request.site_name,
            request.release_version,
            request.current_only
        );

        let releases = self.releases(request.site_name, request.release_version, request.current_only);
        Ok(Response::new(respond("GetRelease", releases)))
    }

    type GetReleaseByUUIDStream = ResponseStream<proto::Release>;

    async fn get_release_by_uuid(
        &self,
        request: Request<proto::GenomeUuidRequest>,
    ) -> Result<Response<Self::GetReleaseByUUIDStream>, Status> {
        let request = request.into_inner();
        log::debug!("GetReleaseByUUID genome_uuid={:?}", request.genome_uuid);

        let releases = self.releases_by_uuid(present(request.genome_uuid));
        Ok(Response::new(respond("GetReleaseByUUID", releases)))
    }

    type GetGenomeSequenceStream = ResponseStream<proto::GenomeSequence>;

    async fn get_genome_sequence(
        &self,
        request: Request<proto::GenomeSequenceRequest>,
    ) -> Result<Response<Self::GetGenomeSequenceStream>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetGenomeSequence genome_uuid={:?} chromosomal_only={}",
            request.genome_uuid,
            request.chromosomal_only
        );

        let sequences = self.genome_sequences(present(request.genome_uuid), request.chromosomal_only);
        Ok(Response::new(respond("GetGenomeSequence", sequences)))
    }

    async fn get_dataset_information(
        &self,
        request: Request<proto::GenomeDatatypeRequest>,
    ) -> Result<Response<proto::DatasetInfos>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetDatasetInformation genome_uuid={:?} dataset_type={:?}",
            request.genome_uuid,
            request.dataset_type
        );

        let dataset_infos = self
            .dataset_information(present(request.genome_uuid), request.dataset_type)
            .await
            .map_err(|err| fault("GetDatasetInformation", err))?;
        Ok(Response::new(dataset_infos))
    }

    async fn get_datasets_list_by_uuid(
        &self,
        request: Request<proto::DatasetsRequest>,
    ) -> Result<Response<proto::Datasets>, Status> {
        let request = request.into_inner();
        log::debug!(
            "GetDatasetsListByUUID genome_uuid={:?} release_version={}",
            request.genome_uuid,
            request.release_version
        );

        let datasets = self
            .datasets_list(present(request.genome_uuid), requested_release(request.release_version))
            .await
            .map_err(|err| fault("GetDatasetsListByUUID", err))?;
        Ok(Response::new(datasets))
    }

    async fn get_organisms_group_count(
        &self,
        request: Request<proto::OrganismsGroupRequest>,
    ) -> Result<Response<proto::OrganismsGroupCount>, Status> {
        let request = request.into_inner();
        log::debug!("GetOrganismsGroupCount release_version={}", request.release_version);

        let counts = self
            .organisms_group_count(requested_release(request.release_version))
            .await
            .map_err(|err| fault("GetOrganismsGroupCount", err))?;
        Ok(Response::new(counts))
    }
}
