pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# APPLOGS CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/applogs/config.yml
#   3. /etc/applogs/config.yml
#
# Values may reference environment variables with $env{NAME}. A reference to
# an unset variable is a configuration error.

# =============================================================================
# BACKEND
# =============================================================================
backend:
  # Endpoint polled for new log records
  poll_url: https://partners.shopify.com/app_logs/poll
  # Endpoint that exchanges a store id and API key for a streaming token
  subscribe_url: https://partners.shopify.com/app_logs/subscribe
  # Bearer credential for the subscribe call (optional)
  # access_token: $env{APPLOGS_ACCESS_TOKEN}
  # Upper bound for each subscribe or poll request. A timeout is retried.
  request_timeout: 30s

# =============================================================================
# POLLING
# =============================================================================
polling:
  # Delay between successful polls
  interval: 450ms
  # Delay after a server error (5xx) or a timed out request
  error_retry_interval: 5s
  # Delay after the server throttles the client (429)
  throttle_retry_interval: 60s
  # Consecutive failed subscribe attempts before giving up
  max_auth_attempts: 3

# =============================================================================
# OUTPUT
# =============================================================================
output:
  # 'text' for human-readable output, 'json' for one JSON object per line
  format: text
  # Also write every record as a JSON file under this directory (optional)
  # write_dir: ~/.local/share/applogs
"#
    .to_string()
}
