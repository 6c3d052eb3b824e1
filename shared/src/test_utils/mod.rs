pub mod dynamo_test_utils;
pub mod http_test_utils;
pub mod mock_identity;
pub mod mock_store;
pub mod test_logging;
