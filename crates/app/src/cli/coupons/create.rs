use atelier::coupons::CouponKind;
use atelier_app::domain::{
    coupons::{CouponsService, PgCouponsService, data::NewCoupon},
    users::records::UserUuid,
};
use clap::{Args, ValueEnum};
use jiff::Timestamp;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Percentage,
    Fixed,
    FreeShipping,
    BuyGet,
}

#[derive(Debug, Args)]
pub(crate) struct CreateCouponArgs {
    /// Coupon code; stored upper-case
    #[arg(long)]
    code: String,

    /// What the coupon gives
    #[arg(long, value_enum)]
    kind: KindArg,

    /// Basis points off for `percentage` (1000 = 10%)
    #[arg(long, required_if_eq("kind", "percentage"))]
    basis_points: Option<u32>,

    /// Minor units off for `fixed`
    #[arg(long, required_if_eq("kind", "fixed"))]
    amount: Option<u64>,

    /// Units paid for in `buy-get`
    #[arg(long, required_if_eq("kind", "buy-get"))]
    buy: Option<u32>,

    /// Units given away in `buy-get`
    #[arg(long, required_if_eq("kind", "buy-get"))]
    get: Option<u32>,

    /// First valid instant, RFC 3339
    #[arg(long)]
    starts_at: Option<Timestamp>,

    /// Last valid instant, RFC 3339
    #[arg(long)]
    ends_at: Option<Timestamp>,

    /// Total uses allowed across all buyers
    #[arg(long)]
    max_uses: Option<u32>,

    /// Each user may redeem the coupon once
    #[arg(long)]
    single_use_per_user: bool,

    /// Only users without a paid order may redeem it
    #[arg(long)]
    first_purchase_only: bool,

    /// Restrict the coupon to one user
    #[arg(long)]
    user: Option<Uuid>,

    /// Items total required, in minor units
    #[arg(long)]
    min_order_value: Option<u64>,

    /// Discount cap, in minor units
    #[arg(long)]
    max_discount: Option<u64>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

impl CreateCouponArgs {
    fn coupon_kind(&self) -> Result<CouponKind, String> {
        let missing = |flag: &str| format!("--{flag} is required for this coupon kind");

        Ok(match self.kind {
            KindArg::Percentage => CouponKind::Percentage {
                basis_points: self.basis_points.ok_or_else(|| missing("basis-points"))?,
            },
            KindArg::Fixed => CouponKind::Fixed {
                amount: self.amount.ok_or_else(|| missing("amount"))?,
            },
            KindArg::FreeShipping => CouponKind::FreeShipping,
            KindArg::BuyGet => CouponKind::BuyGet {
                buy: self.buy.ok_or_else(|| missing("buy"))?,
                get: self.get.ok_or_else(|| missing("get"))?,
            },
        })
    }

    fn into_new_coupon(self) -> Result<NewCoupon, String> {
        let mut coupon = NewCoupon::new(self.code.clone(), self.coupon_kind()?);

        coupon.starts_at = self.starts_at;
        coupon.ends_at = self.ends_at;
        coupon.max_uses = self.max_uses;
        coupon.single_use_per_user = self.single_use_per_user;
        coupon.first_purchase_only = self.first_purchase_only;
        coupon.user = self.user.map(UserUuid::from_uuid);
        coupon.min_order_value = self.min_order_value;
        coupon.max_discount = self.max_discount;

        Ok(coupon)
    }
}

pub(crate) async fn run(args: CreateCouponArgs) -> Result<(), String> {
    let database_url = args.database_url.clone();
    let new_coupon = args.into_new_coupon()?;

    let db = super::super::connect(&database_url).await?;

    let created = PgCouponsService::new(db)
        .create_coupon(new_coupon)
        .await
        .map_err(|error| format!("failed to create coupon: {error}"))?;

    println!("coupon_uuid: {}", created.uuid);
    println!("code: {}", created.coupon.code);
    println!("kind: {}", created.coupon.kind.as_str());

    Ok(())
}
