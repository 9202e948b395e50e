//! Cart Handlers

pub(crate) mod add;
pub(crate) mod clear;
pub(crate) mod lines;
pub(crate) mod merge;
pub(crate) mod quotes;
pub(crate) mod review;
pub(crate) mod view;

use salvo::{http::header::LOCATION, prelude::*};

use crate::extensions::*;

/// Send the browser back to the cart page after a mutation.
pub(crate) fn redirect_to_cart(res: &mut Response) -> Result<StatusCode, StatusError> {
    res.add_header(LOCATION, "/cart", true)
        .or_500("failed to set location header")?
        .status_code(StatusCode::FOUND);

    Ok(StatusCode::FOUND)
}

#[cfg(test)]
mod tests {
    use atelier::carts::CartLine;
    use atelier_app::domain::carts::records::{CartUuid, CartView};
    use uuid::Uuid;

    pub(crate) fn make_view(lines: Vec<CartLine>) -> CartView {
        let items_total = lines.iter().map(CartLine::total).sum();
        let total_quantity = lines.iter().map(|line| line.quantity).sum();
        let fingerprint = (!lines.is_empty()).then(|| "fp_test".to_string());

        CartView {
            uuid: CartUuid::from_uuid(Uuid::nil()),
            lines,
            items_total,
            total_quantity,
            content_hash: "hash".to_string(),
            fingerprint,
            repriced: false,
        }
    }

    pub(crate) fn make_line(variant: Uuid, quantity: u32, unit_price: u64) -> CartLine {
        CartLine {
            variant,
            quantity,
            size: "M".to_string(),
            colour: "Azul".to_string(),
            unit_price,
        }
    }
}
