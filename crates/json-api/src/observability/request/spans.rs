//! Route labels for spans and metrics.

use uuid::Uuid;

/// The request path with identifiers replaced, so labels stay low-cardinality.
pub(super) fn route_for_path(path: &str) -> String {
    if path == "/" {
        return "/".to_owned();
    }

    let mut route = String::new();
    let mut previous = "";

    for segment in path.trim_start_matches('/').split('/') {
        route.push('/');

        if Uuid::parse_str(segment).is_ok() {
            route.push_str("{uuid}");
        } else if previous == "orders" && !segment.is_empty() {
            route.push_str("{code}");
        } else {
            route.push_str(segment);
        }

        previous = segment;
    }

    route
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_and_order_codes_are_replaced() {
        assert_eq!(
            route_for_path("/cart/add/01890a5d-ac96-774b-bcce-b302099a8057"),
            "/cart/add/{uuid}"
        );
        assert_eq!(route_for_path("/orders/K7M2QX9P/ship"), "/orders/{code}/ship");
        assert_eq!(route_for_path("/products"), "/products");
        assert_eq!(route_for_path("/"), "/");
    }
}
