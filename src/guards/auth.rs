use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use mongodb::bson::oid::ObjectId;

use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::{Actor, Role};
use crate::utils::RequestSubject;

/// JWT-based authentication guard
pub struct AuthGuard {
    pub user_id: ObjectId,
    pub role: Role,
}

impl AuthGuard {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "));

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        match crate::services::JwtService::verify_token(token.trim()) {
            Ok(claims) => match ObjectId::parse_str(&claims.sub) {
                Ok(user_id) => {
                    req.local_cache(|| RequestSubject(Some(claims.sub.clone())));
                    Outcome::Success(AuthGuard {
                        user_id,
                        role: claims.role,
                    })
                }
                Err(_) => Outcome::Error((Status::Unauthorized, ())),
            },
            Err(e) => {
                debug!("Rejected bearer token: {}", e);
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        // The guard doesn't contribute any special header/parameter for docs
        Ok(RequestHeaderInput::None)
    }
}
