//! Ways to filter posts and users based on their fields. Filter semantics work just like SQL:
//! If a field is unset, its filter won't be applied.
//! If set, filter out rows that don't match the filter.
use nom::{
    character::complete::{char, digit1, space0},
    combinator::{all_consuming, map_res},
    multi::separated_list,
    sequence::delimited,
    IResult,
};

/// Filters that can be applied to post queries on the datastore.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct PostFilters {
    pub author_id: Option<i32>,
    /// Keep posts tagged with at least one of these hashtag ids.
    pub hashtags: Option<Vec<i32>>,
}

/// Filters that can be applied to user queries on the datastore.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct UserFilters {
    pub nickname: Option<String>,
    pub city: Option<String>,
}

fn id(input: &str) -> IResult<&str, i32> {
    delimited(space0, map_res(digit1, |digits: &str| digits.parse::<i32>()), space0)(input)
}

fn id_list(input: &str) -> IResult<&str, Vec<i32>> {
    all_consuming(separated_list(char(','), id))(input)
}

/// Parse a comma-separated list of ids such as `"1, 2,3"`.
/// Returns `None` when the input isn't a well-formed list.
pub fn parse_ids(input: &str) -> Option<Vec<i32>> {
    id_list(input.trim()).ok().map(|(_, ids)| ids)
}
