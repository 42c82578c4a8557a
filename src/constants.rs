// Default fallback URL for every backend service. Prefer environment variables.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";

// Durable storage keys
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

// One-time bootstrap query parameter carrying a refresh token
pub const REFRESH_TOKEN_QUERY_PARAM: &str = "refresh_token";

// Keyring service name for the durable token backend
pub const SERVICE_NAME_FOR_KEYRING: &str = "corems-console";

// Auth service endpoints
pub const SIGN_IN_PATH: &str = "/api/auth/signin";
pub const SIGN_UP_PATH: &str = "/api/auth/signup";
pub const REFRESH_TOKEN_PATH: &str = "/api/auth/refresh-token";
pub const SIGN_OUT_PATH: &str = "/api/auth/signout";
pub const VERIFY_EMAIL_PATH: &str = "/api/auth/verify-email";
pub const VERIFY_PHONE_PATH: &str = "/api/auth/verify-phone";
pub const RESEND_VERIFICATION_PATH: &str = "/api/auth/resend-verification";
pub const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/api/auth/reset-password";

// Renewal fires this long before the access token expires
pub const DEFAULT_RENEWAL_MARGIN_SECS: u64 = 30;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Holders of this role pass every role check
pub const SUPER_ADMIN_ROLE: &str = "SUPER_ADMIN";

// Synthetic error used when a failure carries no structured server response
pub const UNKNOWN_ERROR_CODE: &str = "unknown.error";
pub const UNKNOWN_ERROR_DESCRIPTION: &str = "Unknown error. Please try again later.";

// Synthetic error used when the backend hands out an unusable token
pub const INVALID_TOKEN_CODE: &str = "auth.token.invalid";
pub const INVALID_TOKEN_DESCRIPTION: &str = "The issued token is invalid or already expired.";

pub const NOT_SIGNED_IN_CODE: &str = "auth.not.signed.in";
pub const NOT_SIGNED_IN_DESCRIPTION: &str = "No active session. Please sign in.";

pub const JSON_CONTENT_TYPE: &str = "application/json";
