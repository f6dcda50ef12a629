table! {
    users (id) {
        id -> Int4,
        created_at -> Timestamptz,
        email -> Text,
        password -> Text,
        nickname -> Text,
        first_name -> Text,
        last_name -> Text,
        avatar -> Nullable<Text>,
        biography -> Text,
        city -> Text,
        is_staff -> Bool,
    }
}

table! {
    hashtags (id) {
        id -> Int4,
        name -> Text,
    }
}

table! {
    posts (id) {
        id -> Int4,
        created_at -> Timestamptz,
        author_id -> Int4,
        title -> Text,
        content -> Text,
        image -> Nullable<Text>,
    }
}

table! {
    posts_hashtags (post_id, hashtag_id) {
        post_id -> Int4,
        hashtag_id -> Int4,
    }
}

table! {
    comments (id) {
        id -> Int4,
        created_at -> Timestamptz,
        post_id -> Int4,
        author_id -> Int4,
        content -> Text,
        image -> Nullable<Text>,
    }
}

table! {
    likes (id) {
        id -> Int4,
        created_by -> Int4,
        post_id -> Int4,
    }
}

// Both columns point at users, so joins on this table spell out their ON clause.
table! {
    follows (id) {
        id -> Int4,
        follower_id -> Int4,
        following_id -> Int4,
    }
}

joinable!(posts -> users (author_id));
joinable!(comments -> posts (post_id));
joinable!(likes -> posts (post_id));
joinable!(posts_hashtags -> posts (post_id));
joinable!(posts_hashtags -> hashtags (hashtag_id));

allow_tables_to_appear_in_same_query!(users, hashtags, posts, posts_hashtags, comments, likes, follows);
