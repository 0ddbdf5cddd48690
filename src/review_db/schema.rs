table! {
    reviews (id) {
        id -> BigInt,

        product_type -> Text,
        product_name -> Nullable<Text>,
        cultivars -> Nullable<Text>,
        breeder -> Nullable<Text>,
        farm -> Nullable<Text>,

        date -> Text,
        is_private -> Bool,
        is_draft -> Bool,
        correlation_key -> Nullable<Text>,

        image -> Nullable<Text>,
        payload -> Text,
    }
}
