// Re-export the proto module from `api-shared` so callers can reference `api_grpc::pb`.
pub use api_shared::pb;

use api_shared::pb::care_server::Care;
use api_shared::pb::{
    HealthRes, RequestChallengeReq, RequestChallengeRes, RunMatchReq, RunMatchRes,
    VerifyChallengeReq, VerifyChallengeRes,
};
use api_shared::{auth, convert, HealthService};
use carelink_core::{CareError, CareServices, ErrorKind};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Authentication interceptor for gRPC requests.
#[allow(clippy::result_large_err)]
pub fn auth_interceptor(req: Request<()>) -> Result<Request<()>, Status> {
    let api_key = req
        .metadata()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("Missing x-api-key header"))?;

    auth::validate_api_key(api_key)?;
    Ok(req)
}

/// Maps a core error to a gRPC status. Internal failures are logged and reported generically.
pub fn to_status(e: CareError) -> Status {
    match e.kind() {
        ErrorKind::Validation => Status::invalid_argument(e.to_string()),
        ErrorKind::NotFound => Status::not_found(e.to_string()),
        ErrorKind::Forbidden => Status::permission_denied(e.to_string()),
        ErrorKind::Conflict => Status::aborted(e.to_string()),
        ErrorKind::InvalidCode | ErrorKind::Expired | ErrorKind::Unauthenticated => {
            Status::unauthenticated(e.to_string())
        }
        ErrorKind::RateLimited => Status::resource_exhausted(e.to_string()),
        ErrorKind::Internal => {
            tracing::error!("gRPC request failed: {}", e);
            Status::internal("Internal error")
        }
    }
}

#[derive(Clone)]
pub struct CareService {
    services: Arc<CareServices>,
}

impl CareService {
    pub fn new(services: Arc<CareServices>) -> Self {
        Self { services }
    }
}

#[tonic::async_trait]
impl Care for CareService {
    async fn health(&self, _req: Request<()>) -> Result<Response<HealthRes>, Status> {
        Ok(Response::new(HealthService::check_health()))
    }

    async fn request_challenge(
        &self,
        req: Request<RequestChallengeReq>,
    ) -> Result<Response<RequestChallengeRes>, Status> {
        let req = req.into_inner();
        let issued = self
            .services
            .challenges
            .issue(&req.identifier)
            .map_err(to_status)?;
        Ok(Response::new(convert::challenge_res(&issued)))
    }

    async fn verify_challenge(
        &self,
        req: Request<VerifyChallengeReq>,
    ) -> Result<Response<VerifyChallengeRes>, Status> {
        let req = req.into_inner();
        let outcome = self
            .services
            .auth
            .login(&req.identifier, &req.code)
            .map_err(to_status)?;
        Ok(Response::new(convert::login_res(&outcome)))
    }

    async fn run_match(&self, req: Request<RunMatchReq>) -> Result<Response<RunMatchRes>, Status> {
        let (criteria, requester) = convert::match_request(req.into_inner()).map_err(to_status)?;
        let outcome = self
            .services
            .matching
            .run_match(criteria, requester)
            .map_err(to_status)?;
        Ok(Response::new(convert::match_res(outcome)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::notify::LogNotifier;
    use carelink_core::tokens::EcdsaTokenIssuer;
    use carelink_core::{ChallengeLookup, CoreConfig, Environment, MemoryStore};
    use std::path::PathBuf;
    use tonic::Code;

    fn service(environment: Environment) -> CareService {
        let cfg = Arc::new(
            CoreConfig::new(PathBuf::from("unused"), environment, ChallengeLookup::ExactCode)
                .unwrap(),
        );
        let services = CareServices::new(
            cfg,
            Arc::new(MemoryStore::new()),
            Arc::new(EcdsaTokenIssuer::generate().unwrap()),
            Arc::new(LogNotifier),
        );
        services
            .directory
            .load_seed(
                r#"
users:
  - email: amani@example.com
    role: PRACTITIONER
    firstName: Amani
    practitioner:
      specializations: [Anxiety]
      languages: [English]
      consultationFee: 30
"#,
            )
            .unwrap();
        CareService::new(Arc::new(services))
    }

    #[tokio::test]
    async fn challenge_then_login() {
        let svc = service(Environment::Development);
        let issued = svc
            .request_challenge(Request::new(RequestChallengeReq {
                identifier: "+15550100".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(issued.code.len(), 6);

        let logged_in = svc
            .verify_challenge(Request::new(VerifyChallengeReq {
                identifier: "+15550100".into(),
                code: issued.code,
            }))
            .await
            .unwrap()
            .into_inner();
        let user = logged_in.user.unwrap();
        assert_eq!(user.role, "PATIENT");
        assert!(user.phone_verified);
        assert!(!logged_in.access_token.is_empty());
    }

    #[tokio::test]
    async fn production_hides_the_code() {
        let svc = service(Environment::Production);
        let issued = svc
            .request_challenge(Request::new(RequestChallengeReq {
                identifier: "pat@example.com".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(issued.code.is_empty());
    }

    #[tokio::test]
    async fn wrong_code_is_unauthenticated() {
        let svc = service(Environment::Development);
        svc.request_challenge(Request::new(RequestChallengeReq {
            identifier: "pat@example.com".into(),
        }))
        .await
        .unwrap();

        let status = svc
            .verify_challenge(Request::new(VerifyChallengeReq {
                identifier: "pat@example.com".into(),
                code: "000000x".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn run_match_ranks_practitioners() {
        let svc = service(Environment::Development);
        let res = svc
            .run_match(Request::new(RunMatchReq {
                symptoms: vec!["anxiety".into()],
                languages: Some(pb::LanguageList {
                    values: vec!["English".into()],
                }),
                max_fee: "50".into(),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(res.matches.len(), 1);
        assert_eq!(res.matches[0].score, 100);
        assert_eq!(res.matches[0].practitioner.as_ref().unwrap().fee, "30");
    }

    #[tokio::test]
    async fn run_match_without_symptoms_is_invalid() {
        let svc = service(Environment::Development);
        let status = svc
            .run_match(Request::new(RunMatchReq::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn storage_failures_are_internal_and_generic() {
        let status = to_status(CareError::StorageLockPoisoned);
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Internal error");
    }
}
