#[cfg(feature = "swagger")]
use utoipa::OpenApi;

#[cfg(feature = "swagger")]
use crate::api::{
    root_network::CreateRootNetworkRequest, studies::CreateStudyRequest, tree::CreateNodeRequest,
};

#[cfg(feature = "swagger")]
#[derive(OpenApi)]
#[openapi(
    components(
        schemas(CreateStudyRequest, CreateNodeRequest, CreateRootNetworkRequest)
    ),
    tags((name="study", description="Network Study Server API v1"))
)]
pub struct ApiDoc;
